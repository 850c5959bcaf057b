use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Scheduler-wide counters (spec §3 "SchedulerStats"), mutated under their
/// own lock — never the catalog lock.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    inner: RwLock<SchedulerStatsInner>,
}

#[derive(Debug, Default, Clone)]
pub struct SchedulerStatsInner {
    pub total_dispatched: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub queue_length: usize,
    pub last_execution: Option<DateTime<Utc>>,
    pub total_latency_ms: f64,
    pub latency_samples: u64,
}

impl SchedulerStatsInner {
    pub fn average_latency_ms(&self) -> f64 {
        if self.latency_samples == 0 {
            0.0
        } else {
            self.total_latency_ms / self.latency_samples as f64
        }
    }
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SchedulerStatsInner {
        self.inner.read().clone()
    }

    pub fn record_dispatch(&self) {
        let mut s = self.inner.write();
        s.total_dispatched += 1;
        s.running += 1;
    }

    pub fn record_skip(&self) {
        self.inner.write().skipped += 1;
    }

    pub fn record_completion(&self, success: bool, latency_ms: f64) {
        let mut s = self.inner.write();
        s.running = s.running.saturating_sub(1);
        if success {
            s.completed += 1;
        } else {
            s.failed += 1;
        }
        s.last_execution = Some(Utc::now());
        s.total_latency_ms += latency_ms;
        s.latency_samples += 1;
    }

    pub fn set_queue_length(&self, len: usize) {
        self.inner.write().queue_length = len;
    }
}
