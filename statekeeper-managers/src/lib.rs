//! # statekeeper-managers
//!
//! Concrete collaborators for the statekeeper transition engine:
//! - [`KeyedLockManager`] - one in-process mutex per lock identity
//! - [`PrometheusMetricManager`] - counters and histograms in a Prometheus registry

pub mod lock;
pub mod metrics;

pub use lock::KeyedLockManager;
pub use metrics::{PrometheusMetricManager, DEFAULT_NAMESPACE};
