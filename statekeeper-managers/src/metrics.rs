//! Prometheus metric manager.
//!
//! Event names become label values, so `statemachine.transition.pay` and
//! `statemachine.transition.pay.success` share two metric families:
//! - `<namespace>_events_total{event}` counter
//! - `<namespace>_duration_seconds{event}` histogram

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use statekeeper_core::MetricManager;
use std::time::Duration;

/// Default metric namespace.
pub const DEFAULT_NAMESPACE: &str = "statekeeper";

/// Transition duration histogram buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
];

/// Metric manager backed by a Prometheus registry.
#[derive(Clone)]
pub struct PrometheusMetricManager {
    registry: Registry,
    events_total: CounterVec,
    duration: HistogramVec,
}

impl PrometheusMetricManager {
    /// Creates a manager with its own registry.
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        Self::with_registry(namespace, Registry::new())
    }

    /// Creates a manager that registers into an existing registry.
    pub fn with_registry(namespace: &str, registry: Registry) -> Result<Self, prometheus::Error> {
        let events_total = CounterVec::new(
            Opts::new(
                format!("{}_events_total", namespace),
                "Total state machine events by name",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{}_duration_seconds", namespace),
                "State machine operation duration in seconds by name",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["event"],
        )?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            events_total,
            duration,
        })
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current count for one event name.
    pub fn event_count(&self, name: &str) -> u64 {
        self.events_total.with_label_values(&[name]).get() as u64
    }

    /// Number of durations recorded for one event name.
    pub fn sample_count(&self, name: &str) -> u64 {
        self.duration.with_label_values(&[name]).get_sample_count()
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricManager for PrometheusMetricManager {
    fn meter(&self, name: &str, count: u64) {
        self.events_total
            .with_label_values(&[name])
            .inc_by(count as f64);
    }

    fn record(&self, name: &str, elapsed: Duration) {
        self.duration
            .with_label_values(&[name])
            .observe(elapsed.as_secs_f64());
    }
}

impl std::fmt::Debug for PrometheusMetricManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetricManager").finish_non_exhaustive()
    }
}
