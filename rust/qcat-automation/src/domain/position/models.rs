//! Position/hedge persistence-side records (spec §3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Not `Serialize`/`Deserialize`: a `BTreeMap` keyed by strategy-id pairs
/// is an in-memory working structure for the hedge-ratio pipeline, never
/// persisted as-is (each `DynamicHedgeRatio` row is persisted
/// individually instead).
#[derive(Debug, Clone)]
pub struct StrategyCorrelationMatrix {
    pub strategy_ids: Vec<String>,
    pub pairwise: BTreeMap<(String, String), f64>,
    pub confidence: BTreeMap<(String, String), f64>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicHedgeRatio {
    pub base_strategy_id: String,
    pub hedge_strategy_id: String,
    pub ratio: f64,
    pub risk_reduction: f64,
    pub cost: f64,
    pub effectiveness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeOperationStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeOperation {
    pub id: String,
    pub base_strategy_id: String,
    pub hedge_strategy_id: String,
    pub amount: f64,
    pub slippage: f64,
    pub cost: f64,
    pub status: HedgeOperationStatus,
    pub created_at: DateTime<Utc>,
}
