//! Dynamic stop-loss service (spec §4.3 `HandleStopLossAdjustment`).

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::db::Database;
use crate::error::AutomationResult;

const STOP_RANGE: (f64, f64) = (0.005, 0.15);
const TAKE_RANGE: (f64, f64) = (0.01, 0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    RangingStable,
    RangingVolatile,
}

/// Regime classification shared with the learning sub-scheduler's pattern
/// recognition handler (spec §4.10: "using the same regime classifier").
pub fn classify_regime(price_change_pct: f64, realized_vol_30d: f64) -> MarketRegime {
    const TREND_THRESHOLD: f64 = 0.03;
    const VOL_THRESHOLD: f64 = 0.04;
    if price_change_pct > TREND_THRESHOLD {
        MarketRegime::TrendingUp
    } else if price_change_pct < -TREND_THRESHOLD {
        MarketRegime::TrendingDown
    } else if realized_vol_30d > VOL_THRESHOLD {
        MarketRegime::RangingVolatile
    } else {
        MarketRegime::RangingStable
    }
}

struct PositionInput {
    id: String,
    symbol: String,
    atr14: f64,
    realized_vol_30d: f64,
    price_change_pct: f64,
}

fn stop_and_take(input: &PositionInput) -> (f64, f64) {
    let regime = classify_regime(input.price_change_pct, input.realized_vol_30d);
    let base_stop = (input.atr14 * 1.5).clamp(STOP_RANGE.0, STOP_RANGE.1);
    let base_take = (input.atr14 * 3.0).clamp(TAKE_RANGE.0, TAKE_RANGE.1);
    let (stop_mult, take_mult) = match regime {
        MarketRegime::TrendingUp | MarketRegime::TrendingDown => (1.2, 1.3),
        MarketRegime::RangingVolatile => (1.1, 0.8),
        MarketRegime::RangingStable => (0.9, 1.0),
    };
    (
        (base_stop * stop_mult).clamp(STOP_RANGE.0, STOP_RANGE.1),
        (base_take * take_mult).clamp(TAKE_RANGE.0, TAKE_RANGE.1),
    )
}

async fn load_positions(db: &Arc<dyn Database>) -> Vec<PositionInput> {
    db.query("select positions", &[])
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| PositionInput {
            id: r.get_str("id").unwrap_or_default().to_string(),
            symbol: r.get_str("symbol").unwrap_or("BTCUSDT").to_string(),
            atr14: r.get_f64("atr14").unwrap_or(0.02),
            realized_vol_30d: r.get_f64("realized_vol_30d").unwrap_or(0.03),
            price_change_pct: r.get_f64("price_change_pct").unwrap_or(0.0),
        })
        .collect()
}

/// `HandleStopLossAdjustment`: enrich active positions with ATR(14) and
/// realized vol(30d), classify regime, and update stop/take bounds.
pub async fn handle_stop_loss_adjustment(db: &Arc<dyn Database>) -> AutomationResult<()> {
    let positions = load_positions(db).await;
    if positions.is_empty() {
        info!("stop-loss adjustment: no active positions");
        return Ok(());
    }
    for position in &positions {
        let (stop, take) = stop_and_take(position);
        db.execute(
            "upsert positions",
            &[
                json!({"id": position.id, "symbol": position.symbol, "stop_loss_pct": stop, "take_profit_pct": take}),
                json!(position.id),
            ],
        )
        .await?;
    }
    info!(count = positions.len(), "stop-loss bounds updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_and_take_stay_within_bounds() {
        let input = PositionInput {
            id: "p1".to_string(),
            symbol: "BTCUSDT".to_string(),
            atr14: 0.2,
            realized_vol_30d: 0.5,
            price_change_pct: 0.1,
        };
        let (stop, take) = stop_and_take(&input);
        assert!(stop >= STOP_RANGE.0 && stop <= STOP_RANGE.1);
        assert!(take >= TAKE_RANGE.0 && take <= TAKE_RANGE.1);
    }

    #[test]
    fn classify_regime_picks_trending_up_on_positive_move() {
        assert_eq!(classify_regime(0.05, 0.01), MarketRegime::TrendingUp);
        assert_eq!(classify_regime(-0.05, 0.01), MarketRegime::TrendingDown);
        assert_eq!(classify_regime(0.0, 0.06), MarketRegime::RangingVolatile);
        assert_eq!(classify_regime(0.0, 0.01), MarketRegime::RangingStable);
    }
}
