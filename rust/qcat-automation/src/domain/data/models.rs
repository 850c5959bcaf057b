//! Data/hotlist persistence-side records (spec §3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotScore {
    pub symbol: String,
    pub volume_component: f64,
    pub price_component: f64,
    pub funding_component: f64,
    pub oi_component: f64,
    pub regime_component: f64,
    pub total_score: f64,
    pub risk_level: RiskLevel,
    pub safe_leverage: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub score: f64,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub time_horizon: &'static str,
    pub expected_return: f64,
    pub max_drawdown: f64,
    pub expires_at: DateTime<Utc>,
}
