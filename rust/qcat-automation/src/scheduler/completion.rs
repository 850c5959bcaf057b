use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{AutomationError, ErrorClass};
use crate::task::{next_run_after, TaskStatus};
use qcat_otel::MetricsSink;

use super::catalog::TaskCatalog;
use super::stats::SchedulerStats;

/// Completion handling (spec §4.1 "Completion", §7 "Error Handling
/// Design"): dispatches on the failed error's [`ErrorClass`] to one of
/// the four documented recovery paths. Success always retries with a
/// linear `retry_count · 1min` backoff and a retry ceiling; the other
/// three classes each recover differently:
///
/// - `Transient` — retried via the normal backoff/ceiling mechanism.
/// - `Validation` — aborts this invocation without consuming a retry
///   slot; the task returns to `Pending` and waits for its next natural
///   `NextRun` rather than an immediate backoff retry, since a retry now
///   would see the same invalid input.
/// - `InvariantViolation` — should never reach here: handlers compensate
///   internally and return `Ok(())` (spec §7). If one leaks through
///   anyway, it is logged at `error!` as a bug and treated as already
///   recovered (same scheduling outcome as success) rather than
///   retried, since by definition the compensating action already ran.
/// - `Fatal` — never retried and never rescheduled; the task is marked
///   `Failed` in place and `NextRun` is left untouched so dispatch does
///   not pick it up again. Propagation to `Stop`/process exit happens
///   above this function, at the `Start`/`Stop` call sites that return
///   these variants directly.
pub fn apply_completion(
    catalog: &Arc<TaskCatalog>,
    stats: &Arc<SchedulerStats>,
    metrics: &Arc<dyn MetricsSink>,
    task_id: &str,
    result: Result<(), AutomationError>,
    latency_ms: f64,
) {
    let now = Utc::now();
    let success = result.is_ok();

    let outcome = catalog.mutate(task_id, |task| {
        task.updated_at = now;
        match &result {
            Ok(()) => {
                task.retry_count = 0;
                task.last_run = Some(now);
                task.next_run = next_run_after(&task.schedule, now);
                task.status = TaskStatus::Pending;
                info!(task = task.name.as_str(), "task completed");
            }
            Err(err) => match err.class() {
                ErrorClass::Transient => {
                    if task.retry_count < task.max_retries {
                        task.retry_count += 1;
                        task.next_run = now + chrono::Duration::minutes(task.retry_count as i64);
                        task.status = TaskStatus::Pending;
                        warn!(
                            task = task.name.as_str(),
                            retry_count = task.retry_count,
                            max_retries = task.max_retries,
                            "task failed, scheduling retry: {err}"
                        );
                    } else {
                        task.status = TaskStatus::Failed;
                        // Open question (a): advance by the schedule rather than
                        // leaving NextRun at the last retry instant, so a failed
                        // task does not monopolize a retry slot if re-enabled.
                        task.next_run = next_run_after(&task.schedule, now);
                        error!(
                            task = task.name.as_str(),
                            retry_count = task.retry_count,
                            "task exhausted retries, marking failed: {err}"
                        );
                    }
                }
                ErrorClass::Validation => {
                    task.status = TaskStatus::Pending;
                    task.next_run = next_run_after(&task.schedule, now);
                    warn!(
                        task = task.name.as_str(),
                        "validation failed, deferring to next scheduled run without consuming a retry: {err}"
                    );
                }
                ErrorClass::InvariantViolation => {
                    error!(task = task.name.as_str(), "invariant-violation error leaked to completion handler, treating as already compensated: {err}");
                    task.retry_count = 0;
                    task.last_run = Some(now);
                    task.next_run = next_run_after(&task.schedule, now);
                    task.status = TaskStatus::Pending;
                }
                ErrorClass::Fatal => {
                    task.status = TaskStatus::Failed;
                    error!(task = task.name.as_str(), "fatal error, task will not be retried or rescheduled: {err}");
                }
            },
        }
        task.name.clone()
    });

    if let Ok(task_name) = outcome {
        metrics.incr_counter(
            if success { "scheduler_tasks_completed_total" } else { "scheduler_tasks_failed_total" },
            &[("task_name", task_name.as_str())],
        );
    }

    stats.record_completion(success, latency_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ScheduledTask, TaskCategory, TaskContext, TaskHandler, TaskType};
    use async_trait::async_trait;
    use qcat_otel::NoopSink;
    use std::time::Duration;

    struct NoopHandler;
    #[async_trait]
    impl TaskHandler for NoopHandler {
        async fn handle(&self, _ctx: TaskContext) -> Result<(), AutomationError> {
            Ok(())
        }
    }

    fn make_task(max_retries: u32) -> ScheduledTask {
        ScheduledTask::new(
            "t1",
            "risk_monitoring",
            TaskType::RiskMonitoring,
            TaskCategory::Risk,
            "*/5 * * * *",
            Duration::from_secs(60),
            max_retries,
            Arc::new(NoopHandler),
        )
    }

    #[test]
    fn failure_schedules_retry_with_linear_backoff() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(3));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(
            &catalog,
            &stats,
            &metrics,
            "t1",
            Err(AutomationError::Timeout),
            10.0,
        );
        let t = catalog.get("t1").unwrap();
        assert_eq!(t.retry_count, 1);
        assert_eq!(t.status, TaskStatus::Pending);

        apply_completion(
            &catalog,
            &stats,
            &metrics,
            "t1",
            Err(AutomationError::Timeout),
            10.0,
        );
        let t = catalog.get("t1").unwrap();
        assert_eq!(t.retry_count, 2);
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn success_resets_retry_count_and_advances_next_run() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(3));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(&catalog, &stats, &metrics, "t1", Err(AutomationError::Timeout), 10.0);
        apply_completion(&catalog, &stats, &metrics, "t1", Ok(()), 10.0);

        let t = catalog.get("t1").unwrap();
        assert_eq!(t.retry_count, 0);
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.last_run.is_some());
    }

    #[test]
    fn exhausted_retries_marks_failed() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(1));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(&catalog, &stats, &metrics, "t1", Err(AutomationError::Timeout), 10.0);
        let t = catalog.get("t1").unwrap();
        assert_eq!(t.status, TaskStatus::Pending);

        apply_completion(&catalog, &stats, &metrics, "t1", Err(AutomationError::Timeout), 10.0);
        let t = catalog.get("t1").unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.retry_count, 1);
    }

    /// Validation errors abort this invocation and defer to the next
    /// natural schedule without consuming a retry slot (spec §7).
    #[test]
    fn validation_error_defers_without_consuming_a_retry() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(3));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(
            &catalog,
            &stats,
            &metrics,
            "t1",
            Err(AutomationError::Validation("sharpe below threshold".into())),
            10.0,
        );

        let t = catalog.get("t1").unwrap();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.retry_count, 0, "validation failures must not consume a retry slot");
        assert_eq!(t.next_run, crate::task::next_run_after(&t.schedule, t.updated_at));
    }

    /// An invariant-violation error leaking through is treated as already
    /// compensated (not retried, not failed) rather than consuming a
    /// retry slot, since the handler is documented to have already fixed
    /// the invariant before returning an error at all (spec §7).
    #[test]
    fn invariant_violation_is_treated_as_recovered() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(3));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(
            &catalog,
            &stats,
            &metrics,
            "t1",
            Err(AutomationError::InvariantViolation("minimum-strategy floor".into())),
            10.0,
        );

        let t = catalog.get("t1").unwrap();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.retry_count, 0);
        assert!(t.last_run.is_some());
    }

    /// Fatal errors never retry and never reschedule: the task is marked
    /// `Failed` immediately, on the first occurrence, regardless of
    /// `max_retries` (spec §7).
    #[test]
    fn fatal_error_fails_immediately_without_retry() {
        let catalog = Arc::new(TaskCatalog::new());
        catalog.register(make_task(3));
        let stats = Arc::new(SchedulerStats::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopSink);

        apply_completion(
            &catalog,
            &stats,
            &metrics,
            "t1",
            Err(AutomationError::CatalogMisconfigured("duplicate id".into())),
            10.0,
        );

        let t = catalog.get("t1").unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.retry_count, 0, "fatal errors must not consume a retry slot");
    }
}
