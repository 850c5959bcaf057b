//! Strategy-domain persistence-side records (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    Draft,
    Testing,
    Active,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyVersion {
    pub id: String,
    pub strategy_id: String,
    pub status: VersionStatus,
    pub params: serde_json::Value,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanaryStatus {
    Running,
    Success,
    Failed,
    Rollback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryDeployment {
    pub id: String,
    pub strategy_id: String,
    pub candidate_version_id: String,
    pub status: CanaryStatus,
    pub traffic_percent: f64,
    pub started_at: DateTime<Utc>,
}

/// A strategy as seen by the elimination/onboarding/optimization handlers.
/// `status` mirrors [`VersionStatus`] collapsed onto the strategy record
/// itself (spec glossary: "runnable" = active or testing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: String,
    pub symbol: String,
    pub strategy_type: String,
    pub status: String,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub avg_daily_pnl: f64,
    pub position_size: f64,
    pub last_optimized: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StrategyRecord {
    pub fn is_runnable(&self) -> bool {
        self.status == "active" || self.status == "testing"
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub strategy_id: String,
    pub params: serde_json::Value,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub trade_count: u32,
    pub improvement_pct: f64,
}

impl OptimizationResult {
    /// Synthetic "pending" result used when the store has no row yet
    /// (spec §4.3 step 1, mock-fallback rule): deliberately fails
    /// validation downstream rather than masquerading as a real result.
    pub fn pending(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            params: serde_json::json!({}),
            sharpe: 0.0,
            max_drawdown: 1.0,
            trade_count: 0,
            improvement_pct: 0.0,
        }
    }
}
