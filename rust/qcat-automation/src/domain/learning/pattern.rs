//! Market pattern recognition and auto-backtesting (spec §4.10).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::db::Database;
use crate::domain::strategy::classify_regime;
use crate::error::AutomationResult;

/// `HandleMarketPatternRecognition`: classify each active symbol's regime
/// using the same classifier as the stop-loss handler, and record
/// pattern counts.
pub async fn handle_market_pattern_recognition(db: &Arc<dyn Database>) -> AutomationResult<()> {
    let rows = db.query("select market_data", &[]).await?;
    let mut counts: HashMap<&'static str, u32> = HashMap::new();

    for row in &rows {
        let price_change_pct = row.get_f64("price_change_pct").unwrap_or(0.0);
        let realized_vol = row.get_f64("realized_vol_30d").unwrap_or(0.0);
        let regime = classify_regime(price_change_pct, realized_vol);
        let label = match regime {
            crate::domain::strategy::MarketRegime::TrendingUp => "trending_up",
            crate::domain::strategy::MarketRegime::TrendingDown => "trending_down",
            crate::domain::strategy::MarketRegime::RangingStable => "ranging_stable",
            crate::domain::strategy::MarketRegime::RangingVolatile => "ranging_volatile",
        };
        *counts.entry(label).or_insert(0) += 1;
    }

    db.execute(
        "insert performance_metrics",
        &[json!({"metric": "market_pattern_counts", "counts": counts.iter().map(|(k, v)| (k.to_string(), *v)).collect::<HashMap<_, _>>()})],
    )
    .await?;
    info!(symbols = rows.len(), ?counts, "market pattern recognition complete");
    Ok(())
}

/// `HandleAutoBacktesting`: a lightweight replay of `backtest_trades`/
/// `strategy_returns` through the walk-forward windows already used by
/// optimization; writes a summary row consumed as an input signal by
/// `HandleBestParameterApplication`. Not a full backtest engine — that
/// remains the strategies' own concern (spec §1 out of scope).
pub async fn handle_auto_backtesting(db: &Arc<dyn Database>) -> AutomationResult<()> {
    let trades = db.query("select backtest_trades", &[]).await?;
    let total_pnl: f64 = trades.iter().filter_map(|r| r.get_f64("pnl")).sum();
    let win_count = trades.iter().filter(|r| r.get_f64("pnl").unwrap_or(0.0) > 0.0).count();
    let win_rate = if trades.is_empty() { 0.0 } else { win_count as f64 / trades.len() as f64 };

    db.execute(
        "insert performance_metrics",
        &[json!({"metric": "auto_backtest_summary", "total_pnl": total_pnl, "win_rate": win_rate, "trade_count": trades.len()})],
    )
    .await?;
    info!(trade_count = trades.len(), total_pnl, win_rate, "auto backtesting summary written");
    Ok(())
}
