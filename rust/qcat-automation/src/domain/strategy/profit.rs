//! Portfolio profit maximization (spec §4.3 `HandleProfitMaximization`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::db::Database;
use crate::error::AutomationResult;
use qcat_otel::MetricsSink;

const REBALANCE_THRESHOLD: f64 = 0.05;

struct SymbolMarketData {
    symbol: String,
    price_change_pct: f64,
    volume: f64,
    volatility: f64,
}

struct ActiveStrategy {
    id: String,
    symbol: String,
    return_pct: f64,
    sharpe: f64,
    max_drawdown: f64,
    current_allocation: f64,
    pnl_pct: f64,
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value.is_infinite() {
        0.0
    } else {
        value
    }
}

/// Opportunity score: price movement 40% + log-volume 30% + volatility
/// 30%, capped at 1.0.
fn opportunity_score(md: &SymbolMarketData) -> f64 {
    let price_term = (md.price_change_pct.abs() / 10.0).min(1.0) * 0.4;
    let volume_term = ((md.volume.max(1.0).ln()) / 20.0).min(1.0) * 0.3;
    let volatility_term = md.volatility.min(1.0) * 0.3;
    (price_term + volume_term + volatility_term).min(1.0)
}

/// Strategy score: return/0.3 * 0.5 + sharpe/2 * 0.3 + (1 - drawdown) *
/// 0.2, clamped to [0, 1].
fn strategy_score(s: &ActiveStrategy) -> f64 {
    let return_term = (s.return_pct / 0.3).min(1.0).max(-1.0) * 0.5;
    let sharpe_term = (s.sharpe / 2.0).min(1.0).max(-1.0) * 0.3;
    let drawdown_term = (1.0 - s.max_drawdown).min(1.0).max(0.0) * 0.2;
    (return_term + sharpe_term + drawdown_term).clamp(0.0, 1.0)
}

fn priority_for(delta: f64) -> u8 {
    let magnitude = delta.abs();
    if magnitude > 0.20 {
        3
    } else if magnitude > 0.10 {
        2
    } else {
        1
    }
}

async fn load_market_data(db: &Arc<dyn Database>) -> Vec<SymbolMarketData> {
    match db.query("select market_data", &[]).await {
        Ok(rows) if !rows.is_empty() => rows
            .iter()
            .map(|r| SymbolMarketData {
                symbol: r.get_str("symbol").unwrap_or("BTCUSDT").to_string(),
                price_change_pct: r.get_f64("price_change_pct").unwrap_or(0.0),
                volume: r.get_f64("volume").unwrap_or(1_000_000.0),
                volatility: r.get_f64("volatility").unwrap_or(0.02),
            })
            .collect(),
        _ => vec![SymbolMarketData {
            symbol: "BTCUSDT".to_string(),
            price_change_pct: 0.0,
            volume: 1_000_000.0,
            volatility: 0.02,
        }],
    }
}

async fn load_active_strategies(db: &Arc<dyn Database>) -> Vec<ActiveStrategy> {
    db.query("select strategies", &[])
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.get_str("status") == Some("active"))
        .map(|r| ActiveStrategy {
            id: r.get_str("id").unwrap_or_default().to_string(),
            symbol: r.get_str("symbol").unwrap_or("BTCUSDT").to_string(),
            return_pct: r.get_f64("return_pct").unwrap_or(0.0),
            sharpe: r.get_f64("sharpe").unwrap_or(0.0),
            max_drawdown: r.get_f64("max_drawdown").unwrap_or(0.0),
            current_allocation: r.get_f64("allocation").unwrap_or(0.0),
            pnl_pct: r.get_f64("pnl_pct").unwrap_or(0.0),
        })
        .collect()
}

/// `HandleProfitMaximization`: weight allocations by opportunity x (1 +
/// pnl%), normalize, and emit rebalance actions where the delta from
/// current exceeds 5%.
pub async fn handle_profit_maximization(
    db: &Arc<dyn Database>,
    metrics: &Arc<dyn MetricsSink>,
) -> AutomationResult<()> {
    let market_data = load_market_data(db).await;
    let strategies = load_active_strategies(db).await;
    if strategies.is_empty() {
        info!("profit maximization: no active strategies");
        return Ok(());
    }

    let opportunity_by_symbol: HashMap<String, f64> = market_data
        .iter()
        .map(|md| (md.symbol.clone(), opportunity_score(md)))
        .collect();

    let weights: Vec<(String, f64)> = strategies
        .iter()
        .map(|s| {
            let opportunity = *opportunity_by_symbol.get(&s.symbol).unwrap_or(&0.5);
            let score = strategy_score(s);
            let weight = opportunity * (1.0 + s.pnl_pct) * (0.5 + score * 0.5);
            (s.id.clone(), weight.max(0.0))
        })
        .collect();

    let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();
    let mut actions = 0;
    for (strategy, (_, weight)) in strategies.iter().zip(weights.iter()) {
        let target = if total_weight > 0.0 { weight / total_weight } else { 0.0 };
        let delta = target - strategy.current_allocation;
        if delta.abs() > REBALANCE_THRESHOLD {
            db.execute(
                "insert rebalance_actions",
                &[json!({
                    "strategy_id": strategy.id,
                    "target_allocation": sanitize(target),
                    "current_allocation": sanitize(strategy.current_allocation),
                    "priority": priority_for(delta),
                })],
            )
            .await?;
            db.execute(
                "insert optimization_history",
                &[json!({
                    "strategy_id": strategy.id,
                    "return_pct": sanitize(strategy.return_pct),
                    "sharpe": sanitize(strategy.sharpe),
                    "target_allocation": sanitize(target),
                })],
            )
            .await?;
            actions += 1;
        }
    }
    if actions > 0 {
        metrics.incr_counter("strategy_rebalance_actions_total", &[]);
    }
    info!(actions, "profit maximization rebalance pass complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_nan_and_inf_with_zero() {
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(0.42), 0.42);
    }

    #[test]
    fn priority_scales_with_magnitude() {
        assert_eq!(priority_for(0.25), 3);
        assert_eq!(priority_for(0.15), 2);
        assert_eq!(priority_for(0.02), 1);
    }
}
