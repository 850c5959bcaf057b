//! Optimization orchestration (spec §4.3 `HandleOptimization`).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::AutomationResult;
use crate::task::TaskContext;

use super::canary::apply_optimization_result;
use super::models::{OptimizationResult, StrategyRecord};

const STALE_DAYS: i64 = 7;
const SHARPE_FLOOR: f64 = 0.5;
const DRAWDOWN_CEILING: f64 = 0.1;
const MAX_PARALLEL: usize = 10;

/// Per-strategy walk-forward configuration submitted to the orchestrator
/// (spec §4.3: `train_window=30d, test_window=7d, step_size=7d,
/// objective=sharpe`).
#[derive(Debug, Clone)]
pub struct WalkForwardConfig {
    pub train_window_days: i64,
    pub test_window_days: i64,
    pub step_size_days: i64,
    pub objective: &'static str,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_window_days: 30,
            test_window_days: 7,
            step_size_days: 7,
            objective: "sharpe",
        }
    }
}

/// Get-or-create per-strategy orchestrator map (spec §4.3 "owns a map of
/// per-strategy optimization orchestrators"). Each entry just tracks the
/// last submitted config; the actual optimization run is delegated to the
/// store (a real optimizer is out of scope, per §1).
#[derive(Default)]
pub struct OptimizationOrchestrators {
    configs: DashMap<String, WalkForwardConfig>,
}

impl OptimizationOrchestrators {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, strategy_id: &str) -> WalkForwardConfig {
        self.configs
            .entry(strategy_id.to_string())
            .or_insert_with(WalkForwardConfig::default)
            .clone()
    }
}

async fn load_candidates(db: &Arc<dyn Database>) -> AutomationResult<Vec<StrategyRecord>> {
    let rows = db.query("select strategies", &[]).await?;
    let now = Utc::now();
    let mut candidates: Vec<StrategyRecord> = rows
        .iter()
        .filter_map(|r| {
            let id = r.get_str("id")?.to_string();
            let status = r.get_str("status").unwrap_or("active").to_string();
            if status != "active" {
                return None;
            }
            let sharpe = r.get_f64("sharpe").unwrap_or(1.0);
            let max_drawdown = r.get_f64("max_drawdown").unwrap_or(0.05);
            let last_optimized = r
                .get("last_optimized")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            let stale = last_optimized
                .map(|t| (now - t).num_days() > STALE_DAYS)
                .unwrap_or(true);
            let underperforming = sharpe < SHARPE_FLOOR || max_drawdown > DRAWDOWN_CEILING;
            if !(stale || underperforming) {
                return None;
            }
            Some(StrategyRecord {
                id,
                symbol: r.get_str("symbol").unwrap_or("BTCUSDT").to_string(),
                strategy_type: r.get_str("strategy_type").unwrap_or("momentum").to_string(),
                status,
                sharpe,
                max_drawdown,
                avg_daily_pnl: r.get_f64("avg_daily_pnl").unwrap_or(0.0),
                position_size: r.get_f64("position_size").unwrap_or(0.0),
                last_optimized,
                created_at: now,
            })
        })
        .collect();

    // Oldest (least recently optimized) first; never-optimized strategies
    // (`None`) sort before any timestamp. Capped at 10.
    candidates.sort_by_key(|s| s.last_optimized);
    candidates.truncate(MAX_PARALLEL);
    Ok(candidates)
}

/// Submit a walk-forward search and await its result. There is no real
/// optimizer behind this core (out of scope, §1); the store is queried for
/// a precomputed `optimization_results` row and a synthetic "pending"
/// result is substituted when absent, per the documented mock-fallback
/// rule (§9).
async fn run_walk_forward(
    db: &Arc<dyn Database>,
    strategy: &StrategyRecord,
    _config: &WalkForwardConfig,
) -> OptimizationResult {
    match db.query("select optimization_results", &[]).await {
        Ok(rows) => rows
            .iter()
            .find(|r| r.get_str("strategy_id") == Some(strategy.id.as_str()))
            .map(|r| OptimizationResult {
                strategy_id: strategy.id.clone(),
                params: r.get("params").cloned().unwrap_or(json!({})),
                sharpe: r.get_f64("sharpe").unwrap_or(0.0),
                max_drawdown: r.get_f64("max_drawdown").unwrap_or(1.0),
                trade_count: r.get("trade_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                improvement_pct: r.get_f64("improvement_pct").unwrap_or(0.0),
            })
            .unwrap_or_else(|| OptimizationResult::pending(&strategy.id)),
        Err(_) => OptimizationResult::pending(&strategy.id),
    }
}

/// `HandleOptimization` (spec §4.3): select stale/underperforming active
/// strategies capped at 10, run each through the orchestrator with a
/// 30-minute per-strategy timeout, collecting errors without aborting
/// peers.
pub async fn handle_optimization(
    ctx: &TaskContext,
    orchestrators: &OptimizationOrchestrators,
) -> AutomationResult<()> {
    let candidates = load_candidates(&ctx.db).await?;
    if candidates.is_empty() {
        info!("optimization: no stale or underperforming strategies found");
        return Ok(());
    }

    let mut joins = Vec::with_capacity(candidates.len());
    for strategy in candidates {
        let config = orchestrators.get_or_create(&strategy.id);
        let db = ctx.db.clone();
        let metrics = ctx.metrics.clone();
        joins.push(tokio::spawn(async move {
            let result = run_walk_forward(&db, &strategy, &config).await;
            let outcome = tokio::time::timeout(
                Duration::from_secs(30 * 60),
                apply_optimization_result(&db, &metrics, result),
            )
            .await;
            (strategy.id, outcome)
        }));
    }

    for join in joins {
        match join.await {
            Ok((strategy_id, Ok(Ok(())))) => {
                info!(strategy_id, "optimization result applied");
            }
            Ok((strategy_id, Ok(Err(err)))) => {
                warn!(strategy_id, "applying optimization result failed: {err}");
            }
            Ok((strategy_id, Err(_))) => {
                warn!(strategy_id, "optimization timed out after 30 minutes");
            }
            Err(join_err) => {
                warn!("optimization task panicked: {join_err}");
            }
        }
    }
    Ok(())
}
