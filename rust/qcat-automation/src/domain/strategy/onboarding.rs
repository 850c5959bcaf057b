//! Onboarding service (spec §4.3 `HandleNewStrategyIntroduction`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use crate::db::Database;
use crate::error::AutomationResult;
use qcat_otel::MetricsSink;

const TARGET_MIX: &[(&str, u32)] = &[
    ("momentum", 2),
    ("mean_reversion", 2),
    ("trend_following", 2),
    ("grid_trading", 1),
    ("arbitrage", 1),
];

const CAP: usize = 10;
const POLL_INTERVAL: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

struct Gap {
    symbol: String,
    strategy_type: &'static str,
    missing: u32,
    priority: f64,
}

fn priority_for(symbol: &str, strategy_type: &str, missing: u32) -> f64 {
    let mut priority = missing as f64 * 10.0;
    if symbol == "BTCUSDT" || symbol == "ETHUSDT" {
        priority += 5.0;
    }
    if strategy_type == "arbitrage" {
        priority += 3.0;
    } else if strategy_type == "momentum" {
        priority += 2.0;
    }
    priority
}

async fn active_symbols(db: &Arc<dyn Database>) -> AutomationResult<Vec<String>> {
    let rows = db.query("select strategies", &[]).await?;
    let mut symbols: Vec<String> = rows
        .iter()
        .filter(|r| r.get_str("status") == Some("active"))
        .filter_map(|r| r.get_str("symbol").map(str::to_string))
        .collect();
    symbols.sort();
    symbols.dedup();
    if symbols.is_empty() {
        symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
    }
    Ok(symbols)
}

async fn coverage_counts(db: &Arc<dyn Database>, symbol: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    if let Ok(rows) = db.query("select strategies", &[]).await {
        for row in rows.iter().filter(|r| r.get_str("symbol") == Some(symbol)) {
            if let Some(t) = row.get_str("strategy_type") {
                *counts.entry(t.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

async fn find_gaps(db: &Arc<dyn Database>) -> AutomationResult<Vec<Gap>> {
    let mut gaps = Vec::new();
    for symbol in active_symbols(db).await? {
        let counts = coverage_counts(db, &symbol).await;
        for (strategy_type, target) in TARGET_MIX {
            let have = *counts.get(*strategy_type).unwrap_or(&0);
            if have < *target {
                let missing = target - have;
                gaps.push(Gap {
                    symbol: symbol.clone(),
                    strategy_type,
                    missing,
                    priority: priority_for(&symbol, strategy_type, missing),
                });
            }
        }
    }
    gaps.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap());
    gaps.truncate(CAP);
    Ok(gaps)
}

/// `HandleNewStrategyIntroduction`: analyze coverage gaps, submit the top
/// priority gaps as an onboarding request, and poll status up to 10
/// minutes. There is no real backtesting/deployment engine behind this
/// core (§1 out of scope), so "poll" here means "wait for the submitted
/// row to leave the `pending` state or time out" against the store.
pub async fn handle_new_strategy_introduction(
    db: &Arc<dyn Database>,
    metrics: &Arc<dyn MetricsSink>,
) -> AutomationResult<()> {
    let gaps = find_gaps(db).await?;
    if gaps.is_empty() {
        info!("no coverage gaps found against target strategy mix");
        return Ok(());
    }

    let mut request_ids = Vec::with_capacity(gaps.len());
    for gap in &gaps {
        let id = uuid::Uuid::new_v4().to_string();
        db.execute(
            "insert strategy_onboarding",
            &[json!({
                "id": id, "symbol": gap.symbol, "strategy_type": gap.strategy_type,
                "missing": gap.missing, "priority": gap.priority, "status": "pending",
            })],
        )
        .await?;
        request_ids.push(id);
        metrics.incr_counter("strategy_onboarding_requested_total", &[("symbol", gap.symbol.as_str())]);
    }

    let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
    loop {
        let rows = db.query("select strategy_onboarding", &[]).await?;
        let all_settled = request_ids.iter().all(|id| {
            rows.iter()
                .find(|r| r.get_str("id") == Some(id.as_str()))
                .map(|r| r.get_str("status") != Some("pending"))
                .unwrap_or(true)
        });
        if all_settled || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    info!(requested = request_ids.len(), "onboarding requests submitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabase;
    use qcat_otel::NoopSink;

    #[tokio::test(start_paused = true)]
    async fn submits_onboarding_requests_for_missing_coverage() {
        let db: Arc<dyn Database> = MockDatabase::shared();
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        handle_new_strategy_introduction(&db, &metrics).await.unwrap();

        let rows = db.query("select strategy_onboarding", &[]).await.unwrap();
        assert!(!rows.is_empty(), "gaps against an empty strategy table should submit requests");
        assert!(rows.len() <= CAP);
    }
}
