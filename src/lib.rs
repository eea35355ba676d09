//! # statekeeper
//!
//! Embeddable runtime for named-transition state machines.
//!
//! Each host object undergoes at most one transition at a time, and global
//! hooks observe every transition. The engine lives in [`statekeeper_core`];
//! lock and metric backends live in [`statekeeper_managers`]. This crate adds
//! configuration loading and logging setup.
//!
//! ```no_run
//! use statekeeper::{Config, StateMachine};
//!
//! statekeeper::logging::init();
//! let context = Config::load()?.context_builder()?.build();
//! let machine = StateMachine::from_yaml_str(&std::fs::read_to_string("order.yaml")?)?;
//! # let _ = (context, machine);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, LockConfig, LockKind, MetricsConfig};
pub use statekeeper_core::*;
pub use statekeeper_managers::{KeyedLockManager, PrometheusMetricManager};
