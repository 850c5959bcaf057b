//! Health checker (spec §4.8): named checks, overall status is the worst
//! across all checks.

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Default)]
pub struct HealthChecker {
    checks: DashMap<String, (HealthStatus, String)>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, name: impl Into<String>, status: HealthStatus, detail: impl Into<String>) {
        self.checks.insert(name.into(), (status, detail.into()));
    }

    pub fn status_of(&self, name: &str) -> Option<HealthStatus> {
        self.checks.get(name).map(|e| e.0)
    }

    /// Worst status across all reported checks. `Healthy` if no checks
    /// have been reported yet.
    pub fn overall(&self) -> HealthStatus {
        self.checks
            .iter()
            .map(|e| e.value().0)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    pub fn snapshot(&self) -> Vec<(String, HealthStatus, String)> {
        self.checks
            .iter()
            .map(|e| (e.key().clone(), e.value().0, e.value().1.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_worst_of_reported_checks() {
        let checker = HealthChecker::new();
        checker.report("database", HealthStatus::Healthy, "ok");
        checker.report("task_queue", HealthStatus::Degraded, "75% full");
        assert_eq!(checker.overall(), HealthStatus::Degraded);

        checker.report("exchange_connectivity", HealthStatus::Unhealthy, "no heartbeat");
        assert_eq!(checker.overall(), HealthStatus::Unhealthy);
    }

    #[test]
    fn no_checks_reports_healthy() {
        let checker = HealthChecker::new();
        assert_eq!(checker.overall(), HealthStatus::Healthy);
    }
}
