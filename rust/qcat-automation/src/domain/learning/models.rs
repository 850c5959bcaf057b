//! Learning-domain records (spec §4.10, supplemented): factor library
//! entries and genetic-evolution population members.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorSnapshot {
    pub symbol: String,
    pub momentum: f64,
    pub volatility: f64,
    pub volume_trend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCandidate {
    pub params: Value,
    pub sharpe: f64,
}
