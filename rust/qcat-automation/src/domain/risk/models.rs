//! Fund/risk persistence-side records (spec §3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    // variants ordered Minimal < Low < Medium < High < Critical for derive(Ord)
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else if score >= 0.2 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundConcentrationRisk {
    pub total_funds: f64,
    pub concentration_ratio: f64,
    pub dominant_location: String,
    pub risk_level: RiskLevel,
    pub total_risk_score: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalFundDistribution {
    pub targets: BTreeMap<String, f64>,
    pub risk_level: RiskLevel,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Pending,
    Executing,
    Confirming,
    Completed,
    Failed,
    Rollback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundTransfer {
    pub id: String,
    pub from_location: String,
    pub to_location: String,
    pub amount: f64,
    pub fee: f64,
    pub priority: u8,
    pub state: TransferState,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdWalletOperation {
    pub id: String,
    pub transfer_id: String,
    pub required_signatures: u32,
    pub provided_signatures: u32,
    pub completed: bool,
}

impl ColdWalletOperation {
    pub fn new(transfer_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transfer_id: transfer_id.into(),
            required_signatures: 3,
            provided_signatures: 0,
            completed: false,
        }
    }

    pub fn sign(&mut self) {
        if self.provided_signatures < self.required_signatures {
            self.provided_signatures += 1;
        }
        self.completed = self.provided_signatures >= self.required_signatures;
    }
}
