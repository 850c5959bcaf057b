use std::sync::Mutex;

use prometheus::{Encoder, GaugeVec, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::MetricsSink;

/// Prometheus-backed implementation of [`MetricsSink`].
///
/// Counters, gauges, and latency histograms are created lazily the first
/// time a given metric name is observed, keyed by label names derived from
/// the first observation — the scheduler and executor always call with a
/// fixed, small label set per metric name (e.g. `task_name`, `action_type`),
/// so this is safe in practice and mirrors how the teacher's connector
/// layer builds ad-hoc `serde_json::Value` shapes on first use rather than
/// pre-declaring every field.
pub struct PrometheusSink {
    registry: Registry,
    counters: Mutex<std::collections::HashMap<String, IntCounterVec>>,
    gauges: Mutex<std::collections::HashMap<String, GaugeVec>>,
    histograms: Mutex<std::collections::HashMap<String, HistogramVec>>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Mutex::new(std::collections::HashMap::new()),
            gauges: Mutex::new(std::collections::HashMap::new()),
            histograms: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Render the current registry in the Prometheus text exposition
    /// format, for a `/metrics` endpoint.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buf)
            .unwrap_or_default();
        String::from_utf8(buf).unwrap_or_default()
    }

    fn label_names(labels: &[(&str, &str)]) -> Vec<&str> {
        labels.iter().map(|(k, _)| *k).collect()
    }

    fn label_values<'a>(labels: &'a [(&str, &str)]) -> Vec<&'a str> {
        labels.iter().map(|(_, v)| *v).collect()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusSink {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let counter = counters.entry(name.to_string()).or_insert_with(|| {
            let vec = IntCounterVec::new(Opts::new(name, name), &Self::label_names(labels))
                .expect("valid counter metric name");
            let _ = self.registry.register(Box::new(vec.clone()));
            vec
        });
        if let Ok(metric) = counter.get_metric_with_label_values(&Self::label_values(labels)) {
            metric.inc();
        }
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let mut gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        let gauge = gauges.entry(name.to_string()).or_insert_with(|| {
            let vec = GaugeVec::new(Opts::new(name, name), &Self::label_names(labels))
                .expect("valid gauge metric name");
            let _ = self.registry.register(Box::new(vec.clone()));
            vec
        });
        if let Ok(metric) = gauge.get_metric_with_label_values(&Self::label_values(labels)) {
            metric.set(value);
        }
    }

    fn observe_latency_ms(&self, name: &str, value_ms: f64, labels: &[(&str, &str)]) {
        let mut histograms = self.histograms.lock().unwrap_or_else(|e| e.into_inner());
        let histogram = histograms.entry(name.to_string()).or_insert_with(|| {
            let vec = HistogramVec::new(
                prometheus::HistogramOpts::new(name, name),
                &Self::label_names(labels),
            )
            .expect("valid histogram metric name");
            let _ = self.registry.register(Box::new(vec.clone()));
            vec
        });
        if let Ok(metric) = histogram.get_metric_with_label_values(&Self::label_values(labels)) {
            metric.observe(value_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_gauge_render() {
        let sink = PrometheusSink::new();
        sink.incr_counter("tasks_dispatched_total", &[("task_name", "risk_monitoring")]);
        sink.incr_counter("tasks_dispatched_total", &[("task_name", "risk_monitoring")]);
        sink.set_gauge("queue_length", 42.0, &[("queue", "scheduler")]);

        let rendered = sink.render();
        assert!(rendered.contains("tasks_dispatched_total"));
        assert!(rendered.contains("queue_length"));
    }
}
