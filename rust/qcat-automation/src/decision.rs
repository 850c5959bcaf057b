//! Decision tracker (spec §4.8): per-decision-chain records with ordered
//! decisions and a final action.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct Decision {
    pub label: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DecisionChain {
    pub id: String,
    pub decisions: Vec<Decision>,
    pub final_action: Option<String>,
    pub completed: bool,
}

#[derive(Default)]
pub struct DecisionTracker {
    chains: DashMap<String, DecisionChain>,
}

impl DecisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_chain(&self, id: impl Into<String>) -> String {
        let id = id.into();
        self.chains.insert(
            id.clone(),
            DecisionChain {
                id: id.clone(),
                decisions: Vec::new(),
                final_action: None,
                completed: false,
            },
        );
        id
    }

    pub fn append(&self, chain_id: &str, label: impl Into<String>, detail: impl Into<String>) {
        if let Some(mut chain) = self.chains.get_mut(chain_id) {
            chain.decisions.push(Decision {
                label: label.into(),
                detail: detail.into(),
                recorded_at: Utc::now(),
            });
        }
    }

    pub fn complete(&self, chain_id: &str, final_action: impl Into<String>) {
        if let Some(mut chain) = self.chains.get_mut(chain_id) {
            chain.final_action = Some(final_action.into());
            chain.completed = true;
        }
    }

    pub fn get(&self, chain_id: &str) -> Option<DecisionChain> {
        self.chains.get(chain_id).map(|c| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_records_ordered_decisions_and_final_action() {
        let tracker = DecisionTracker::new();
        let id = tracker.start_chain("elimination-2026-07-28");
        tracker.append(&id, "assess", "3 runnable strategies, at floor");
        tracker.append(&id, "compensate", "generating 0 strategies, already at floor");
        tracker.complete(&id, "skip_elimination");

        let chain = tracker.get(&id).unwrap();
        assert_eq!(chain.decisions.len(), 2);
        assert!(chain.completed);
        assert_eq!(chain.final_action.as_deref(), Some("skip_elimination"));
    }
}
