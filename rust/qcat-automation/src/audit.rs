//! Audit logger (spec §4.8): a fixed-cap ring buffer of audit records with
//! a filtered query interface.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub result: String,
    pub duration: Duration,
    pub recorded_at: DateTime<Utc>,
}

pub struct AuditLogger {
    capacity: usize,
    records: RwLock<VecDeque<AuditRecord>>,
}

impl AuditLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(
        &self,
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        result: impl Into<String>,
        duration: Duration,
    ) {
        let mut records = self.records.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(AuditRecord {
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            result: result.into(),
            duration,
            recorded_at: Utc::now(),
        });
    }

    /// Records matching `predicate`, most recent last.
    pub fn query(&self, predicate: impl Fn(&AuditRecord) -> bool) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest_past_capacity() {
        let logger = AuditLogger::new(2);
        logger.record("scheduler", "dispatch", "task:a", "ok", Duration::from_millis(1));
        logger.record("scheduler", "dispatch", "task:b", "ok", Duration::from_millis(1));
        logger.record("scheduler", "dispatch", "task:c", "ok", Duration::from_millis(1));

        assert_eq!(logger.len(), 2);
        let resources: Vec<_> = logger.query(|_| true).iter().map(|r| r.resource.clone()).collect();
        assert_eq!(resources, vec!["task:b".to_string(), "task:c".to_string()]);
    }

    #[test]
    fn query_filters_by_predicate() {
        let logger = AuditLogger::new(10);
        logger.record("a", "dispatch", "task:a", "ok", Duration::from_millis(1));
        logger.record("a", "dispatch", "task:b", "failed", Duration::from_millis(1));

        let failed = logger.query(|r| r.result == "failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].resource, "task:b");
    }
}
