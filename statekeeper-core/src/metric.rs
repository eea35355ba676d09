//! Metric manager contract.

use std::time::{Duration, Instant};

/// Counts named events and records durations.
///
/// Implementations must never block the caller or change the outcome of
/// the work being measured.
pub trait MetricManager: Send + Sync {
    /// Increments the counter for `name` by `count`.
    fn meter(&self, name: &str, count: u64);

    /// Records one elapsed duration for `name`.
    fn record(&self, name: &str, elapsed: Duration);
}

impl dyn MetricManager + '_ {
    /// Runs `work`, records how long it took, and returns its result unchanged.
    pub fn time<R>(&self, name: &str, work: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = work();
        self.record(name, start.elapsed());
        result
    }
}

/// Metric manager that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricManager;

impl MetricManager for NullMetricManager {
    fn meter(&self, _name: &str, _count: u64) {}

    fn record(&self, _name: &str, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        timings: Mutex<Vec<String>>,
    }

    impl MetricManager for Recording {
        fn meter(&self, _name: &str, _count: u64) {}

        fn record(&self, name: &str, _elapsed: Duration) {
            self.timings.lock().push(name.to_string());
        }
    }

    #[test]
    fn test_time_returns_result_unchanged() {
        let metrics: &dyn MetricManager = &NullMetricManager;
        assert_eq!(metrics.time("x", || 7), 7);
        let failed: Result<(), String> = metrics.time("x", || Err("bad".to_string()));
        assert_eq!(failed, Err("bad".to_string()));
    }

    #[test]
    fn test_time_records_failures_too() {
        let recording = Recording::default();
        let metrics: &dyn MetricManager = &recording;
        let _: Result<(), ()> = metrics.time("op", || Err(()));
        metrics.time("op", || ());
        assert_eq!(*recording.timings.lock(), vec!["op", "op"]);
    }
}
