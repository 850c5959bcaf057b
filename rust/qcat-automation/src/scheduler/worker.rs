use std::sync::Arc;
use std::time::Instant;

use tracing::{error, instrument, warn};

use crate::audit::AuditLogger;
use crate::db::Database;
use crate::decision::DecisionTracker;
use crate::error::AutomationError;
use crate::exchange::ExchangeClient;
use crate::executor::RealtimeExecutor;
use crate::health::HealthChecker;
use crate::task::TaskContext;
use qcat_otel::MetricsSink;

use super::catalog::TaskCatalog;
use super::completion::apply_completion;
use super::stats::SchedulerStats;

/// Execute a single dequeued task (spec §4.2): build a per-task timeout
/// context, invoke the handler, recover a panic as a task failure, and
/// hand the result to [`apply_completion`].
#[allow(clippy::too_many_arguments)]
pub async fn run_one(
    worker_id: usize,
    task_id: String,
    catalog: &Arc<TaskCatalog>,
    stats: &Arc<SchedulerStats>,
    db: &Arc<dyn Database>,
    metrics: &Arc<dyn MetricsSink>,
    executor: &Arc<RealtimeExecutor>,
    exchange: &Arc<dyn ExchangeClient>,
    health: &Arc<HealthChecker>,
    audit: &Arc<AuditLogger>,
    decisions: &Arc<DecisionTracker>,
) {
    let Some(task) = catalog.get(&task_id) else {
        warn!(worker_id, task_id, "task vanished before worker could run it");
        return;
    };

    let ctx = TaskContext {
        db: db.clone(),
        metrics: metrics.clone(),
        executor: executor.clone(),
        exchange: exchange.clone(),
        health: health.clone(),
        audit: audit.clone(),
        decisions: decisions.clone(),
        config: task.config.clone(),
        timeout: task.timeout,
    };

    let started = Instant::now();
    let result = run_handler_with_timeout(worker_id, &task.name, task.handler.clone(), ctx, task.timeout).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    metrics.observe_latency_ms(
        "scheduler_task_duration_ms",
        latency_ms,
        &[("task_name", task.name.as_str())],
    );

    apply_completion(catalog, stats, metrics, &task_id, result, latency_ms);
}

#[instrument(skip(handler, ctx))]
async fn run_handler_with_timeout(
    worker_id: usize,
    task_name: &str,
    handler: Arc<dyn crate::task::TaskHandler>,
    ctx: TaskContext,
    timeout: std::time::Duration,
) -> Result<(), AutomationError> {
    let join = tokio::spawn(async move { handler.handle(ctx).await });

    match tokio::time::timeout(timeout, join).await {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) => {
            error!(worker_id, task_name, "handler panicked: {join_err}");
            Err(AutomationError::HandlerPanicked(join_err.to_string()))
        }
        Err(_) => Err(AutomationError::Timeout),
    }
}
