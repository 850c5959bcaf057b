//! Tracing initialization and a counter/gauge metrics sink for the
//! automation core.
//!
//! The core consumes metrics only through the [`MetricsSink`] trait (see
//! §6 of the spec: "metrics collector consumed as a counter/gauge sink").
//! [`PrometheusSink`] is the concrete implementation backing production
//! use; tests typically use [`NoopSink`].

mod prometheus_sink;
mod tracing_init;

pub use prometheus_sink::PrometheusSink;
pub use tracing_init::init_tracing;

/// Counter/gauge sink boundary the automation core is built against.
///
/// Labels are a flat slice of `(key, value)` pairs rather than a generic
/// map, matching the low-cardinality, fixed-label style metrics are
/// actually called with throughout the scheduler and executor.
pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    fn observe_latency_ms(&self, name: &str, value_ms: f64, labels: &[(&str, &str)]);
}

/// A sink that discards every observation. Used in tests and anywhere a
/// `MetricsSink` is required but no collector is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn incr_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn observe_latency_ms(&self, _name: &str, _value_ms: f64, _labels: &[(&str, &str)]) {}
}
