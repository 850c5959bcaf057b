//! The task model (spec §3 "ScheduledTask").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::AutomationResult;

/// Closed task-type enumeration (fixed catalog, spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    StrategyOptimization,
    PositionOptimization,
    RiskMonitoring,
    DataCleaning,
    HealthCheck,
    Learning,
    PeriodicOptimization,
    Elimination,
    NewStrategyIntroduction,
    MinimumStrategyCheck,
    StopLossAdjustment,
    HotCoinRecommendation,
    ProfitMaximization,
    FundDistribution,
    MultiStrategyHedging,
    FactorLibraryUpdate,
    AutoML,
    GeneticEvolution,
    MarketPatternRecognition,
    AbnormalMarketResponse,
    AccountSecurityMonitoring,
    DynamicFundAllocation,
    LayeredPositionManagement,
    AutoBacktesting,
    MultiExchangeRedundancy,
    AuditLogging,
    BestParameterApplication,
}

/// Closed task-category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Strategy,
    Risk,
    Position,
    Data,
    System,
    Learning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Stopped,
}

/// The closed set of schedule strings recognized by `next_run_after`
/// (spec §3/§4.1). Any string outside this set defaults to hourly.
pub fn next_run_after(schedule: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match schedule {
        "*/1 * * * *" => now + chrono::Duration::minutes(1),
        "*/5 * * * *" => now + chrono::Duration::minutes(5),
        "*/10 * * * *" => now + chrono::Duration::minutes(10),
        "*/15 * * * *" => now + chrono::Duration::minutes(15),
        "*/20 * * * *" => now + chrono::Duration::minutes(20),
        "*/30 * * * *" => now + chrono::Duration::minutes(30),
        "0 * * * *" => now + chrono::Duration::hours(1),
        "0 */4 * * *" => now + chrono::Duration::hours(4),
        "0 */6 * * *" => now + chrono::Duration::hours(6),
        "0 0 * * *" => now + chrono::Duration::days(1),
        "0 1 * * 0" => now + chrono::Duration::days(7),
        "0 2 * * *" => now + chrono::Duration::days(1),
        "0 2 * * 0" => now + chrono::Duration::days(7),
        "0 3 * * *" => now + chrono::Duration::days(1),
        "0 3 * * 0" => now + chrono::Duration::days(7),
        "0 4 * * *" => now + chrono::Duration::days(1),
        "0 0 * * 0" => now + chrono::Duration::days(7),
        _ => now + chrono::Duration::hours(1),
    }
}

/// Execution context passed to every handler invocation: the shared
/// collaborators plus the task's own config map and deadline. Handlers
/// must propagate `deadline` into every database/exchange call (spec §5).
#[derive(Clone)]
pub struct TaskContext {
    pub db: Arc<dyn crate::db::Database>,
    pub metrics: Arc<dyn qcat_otel::MetricsSink>,
    pub executor: Arc<crate::executor::RealtimeExecutor>,
    pub exchange: Arc<dyn crate::exchange::ExchangeClient>,
    pub health: Arc<crate::health::HealthChecker>,
    pub audit: Arc<crate::audit::AuditLogger>,
    pub decisions: Arc<crate::decision::DecisionTracker>,
    pub config: HashMap<String, Value>,
    pub timeout: Duration,
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()>;
}

pub struct ScheduledTask {
    pub id: String,
    pub name: String,
    pub task_type: TaskType,
    pub category: TaskCategory,
    pub schedule: String,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub enabled: bool,
    pub priority: u8,
    pub timeout: Duration,
    pub retry_count: u32,
    pub max_retries: u32,
    pub config: HashMap<String, Value>,
    pub handler: Arc<dyn TaskHandler>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        task_type: TaskType,
        category: TaskCategory,
        schedule: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            task_type,
            category,
            schedule: schedule.into(),
            next_run: now,
            last_run: None,
            status: TaskStatus::Pending,
            enabled: false,
            priority: 5,
            timeout,
            retry_count: 0,
            max_retries,
            config: HashMap::new(),
            handler,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_dispatchable(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.status == TaskStatus::Pending && self.next_run <= now
    }
}

impl Clone for ScheduledTask {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            task_type: self.task_type,
            category: self.category,
            schedule: self.schedule.clone(),
            next_run: self.next_run,
            last_run: self.last_run,
            status: self.status,
            enabled: self.enabled,
            priority: self.priority,
            timeout: self.timeout,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            config: self.config.clone(),
            handler: self.handler.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("enabled", &self.enabled)
            .field("next_run", &self.next_run)
            .field("retry_count", &self.retry_count)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_schedule_defaults_to_hourly() {
        let now = Utc::now();
        let next = next_run_after("not a real cron", now);
        assert_eq!(next, now + chrono::Duration::hours(1));
    }

    #[test]
    fn five_minute_schedule_advances_five_minutes() {
        let now = Utc::now();
        let next = next_run_after("*/5 * * * *", now);
        assert_eq!(next, now + chrono::Duration::minutes(5));
    }

    #[test]
    fn weekly_schedule_advances_seven_days() {
        let now = Utc::now();
        let next = next_run_after("0 0 * * 0", now);
        assert_eq!(next, now + chrono::Duration::days(7));
    }
}
