//! Fund concentration assessment (spec §4.4).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::db::Database;
use crate::error::AutomationResult;

use super::models::{FundConcentrationRisk, RiskLevel};

/// Pull per-exchange and per-wallet balances. Mock-fallback: an empty
/// `exchange_balances`/`wallet_balances` pair yields a single synthetic
/// `binance` location holding the full (mock) total, matching the
/// product's "smooth startup on an empty DB" rule.
pub async fn load_balances(db: &Arc<dyn Database>) -> BTreeMap<String, f64> {
    let mut balances = BTreeMap::new();
    if let Ok(rows) = db.query("select exchange_balances", &[]).await {
        for row in rows {
            if let (Some(location), Some(amount)) = (row.get_str("location"), row.get_f64("amount")) {
                *balances.entry(location.to_string()).or_insert(0.0) += amount;
            }
        }
    }
    if let Ok(rows) = db.query("select wallet_balances", &[]).await {
        for row in rows {
            if let (Some(location), Some(amount)) = (row.get_str("location"), row.get_f64("amount")) {
                *balances.entry(location.to_string()).or_insert(0.0) += amount;
            }
        }
    }
    if balances.is_empty() {
        balances.insert("binance".to_string(), 70_000.0);
        balances.insert("cold".to_string(), 20_000.0);
        balances.insert("hot".to_string(), 10_000.0);
    }
    balances
}

fn exchange_count(balances: &BTreeMap<String, f64>) -> usize {
    balances
        .keys()
        .filter(|k| !matches!(k.as_str(), "cold" | "hot"))
        .count()
}

/// Assessment algorithm (spec §4.4): concentration ratio is the maximum
/// single-location share; weighted risk factors combine into a total
/// score mapped to five levels.
pub async fn assess_concentration(db: &Arc<dyn Database>) -> AutomationResult<FundConcentrationRisk> {
    let balances = load_balances(db).await;
    let total: f64 = balances.values().sum();
    let (dominant_location, dominant_amount) = balances
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(k, v)| (k.clone(), *v))
        .unwrap_or(("binance".to_string(), 0.0));

    let concentration_ratio = if total > 0.0 { dominant_amount / total } else { 0.0 };
    let hot_share = balances.get("hot").copied().unwrap_or(0.0) / total.max(1.0);

    let exchange_concentration = ((concentration_ratio - 0.5).max(0.0)) * 2.0;
    let hot_wallet_risk = ((hot_share - 0.2).max(0.0)) * 2.5;
    let geographic_risk = 0.3_f64;
    let liquidity_risk = match exchange_count(&balances) {
        0 | 1 => 0.8,
        2 => 0.4,
        _ => 0.1,
    };
    let technical_risk = 0.2_f64;

    let total_risk_score = concentration_ratio * 0.4
        + exchange_concentration * 0.25
        + hot_wallet_risk * 0.15
        + geographic_risk * 0.1
        + liquidity_risk * 0.05
        + technical_risk * 0.05;

    Ok(FundConcentrationRisk {
        total_funds: total,
        concentration_ratio,
        dominant_location,
        risk_level: RiskLevel::from_score(total_risk_score),
        total_risk_score,
        computed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbRow, MockDatabase};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn scenario_s6_pre_state_is_high_risk_at_0_7_concentration() {
        let db = MockDatabase::shared();
        let mut binance = HashMap::new();
        binance.insert("location".to_string(), json!("binance"));
        binance.insert("amount".to_string(), json!(70_000.0));
        let mut cold = HashMap::new();
        cold.insert("location".to_string(), json!("cold"));
        cold.insert("amount".to_string(), json!(20_000.0));
        let mut hot = HashMap::new();
        hot.insert("location".to_string(), json!("hot"));
        hot.insert("amount".to_string(), json!(10_000.0));
        db.seed("exchange_balances", vec![DbRow(binance)]);
        db.seed("wallet_balances", vec![DbRow(cold), DbRow(hot)]);

        let db_dyn: Arc<dyn Database> = db.clone();
        let assessment = assess_concentration(&db_dyn).await.unwrap();

        assert!((assessment.concentration_ratio - 0.7).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }
}
