//! Runtime configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via STATEKEEPER_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use statekeeper_core::ContextBuilder;
use statekeeper_managers::{KeyedLockManager, PrometheusMetricManager, DEFAULT_NAMESPACE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lock manager configuration.
    pub lock: LockConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("STATEKEEPER_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Serialize(path.to_path_buf(), e))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Applies overrides from a variable lookup (the process environment in `load`).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        self.lock.apply_overrides(&lookup)?;
        self.metrics.apply_overrides(&lookup)?;
        Ok(())
    }

    /// Returns a context builder wired with the configured managers.
    ///
    /// Hooks are left for the caller to add.
    pub fn context_builder(&self) -> Result<ContextBuilder, ConfigError> {
        let mut builder = ContextBuilder::default();

        match self.lock.kind {
            LockKind::None => {
                tracing::info!("  Locking: disabled");
            }
            LockKind::Keyed => {
                let manager = match self.lock.timeout() {
                    Some(timeout) => {
                        tracing::info!("  Locking: keyed (timeout {:?})", timeout);
                        KeyedLockManager::with_timeout(timeout)
                    }
                    None => {
                        tracing::info!("  Locking: keyed (no timeout)");
                        KeyedLockManager::new()
                    }
                };
                builder = builder.lock_manager(Arc::new(manager));
            }
        }

        if self.metrics.enabled {
            let manager = PrometheusMetricManager::new(&self.metrics.namespace)?;
            tracing::info!("  Metrics: prometheus (namespace {})", self.metrics.namespace);
            builder = builder.metric_manager(Arc::new(manager));
        } else {
            tracing::info!("  Metrics: disabled");
        }

        Ok(builder)
    }
}

/// Which lock manager to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// No locking; callers synchronize externally.
    None,
    /// One in-process mutex per identity.
    #[default]
    Keyed,
}

/// Lock manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub kind: LockKind,
    /// Maximum wait for a lock in milliseconds (unset = wait forever).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl LockConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(kind) = lookup("STATEKEEPER_LOCK_KIND") {
            self.kind = match kind.to_lowercase().as_str() {
                "none" => LockKind::None,
                "keyed" => LockKind::Keyed,
                _ => return Err(ConfigError::invalid("STATEKEEPER_LOCK_KIND", &kind)),
            };
        }

        if let Some(timeout) = lookup("STATEKEEPER_LOCK_TIMEOUT_MS") {
            let ms = timeout
                .parse()
                .map_err(|_| ConfigError::invalid("STATEKEEPER_LOCK_TIMEOUT_MS", &timeout))?;
            self.timeout_ms = Some(ms);
        }

        Ok(())
    }

    /// Returns the lock timeout as Duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record transition metrics in a Prometheus registry.
    pub enabled: bool,
    /// Prefix for metric family names.
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl MetricsConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(enabled) = lookup("STATEKEEPER_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }

        if let Some(namespace) = lookup("STATEKEEPER_METRICS_NAMESPACE") {
            if namespace.is_empty() {
                return Err(ConfigError::invalid("STATEKEEPER_METRICS_NAMESPACE", &namespace));
            }
            self.namespace = namespace;
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file I/O failed on '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("failed to serialize config for '{}': {}", .0.display(), .1)]
    Serialize(PathBuf, #[source] serde_yaml::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("failed to set up metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lock.kind, LockKind::Keyed);
        assert_eq!(config.lock.timeout(), None);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.namespace, "statekeeper");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(vars(&[
                ("STATEKEEPER_LOCK_KIND", "NONE"),
                ("STATEKEEPER_LOCK_TIMEOUT_MS", "250"),
                ("STATEKEEPER_METRICS_ENABLED", "true"),
                ("STATEKEEPER_METRICS_NAMESPACE", "orders"),
            ]))
            .unwrap();

        assert_eq!(config.lock.kind, LockKind::None);
        assert_eq!(config.lock.timeout(), Some(Duration::from_millis(250)));
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.namespace, "orders");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(vars(&[("STATEKEEPER_LOCK_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statekeeper.yaml");
        let config = Config {
            lock: LockConfig {
                kind: LockKind::Keyed,
                timeout_ms: Some(100),
            },
            metrics: MetricsConfig {
                enabled: true,
                namespace: "svc".to_string(),
            },
        };

        config.save(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "lock:\n  timeout_ms: 5\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.lock.kind, LockKind::Keyed);
        assert_eq!(config.lock.timeout_ms, Some(5));
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_save_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("statekeeper.yaml");
        let err = Config::default().save(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        assert!(!err.to_string().contains("parse"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/statekeeper.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_context_builder_from_config() {
        let config = Config {
            lock: LockConfig {
                kind: LockKind::Keyed,
                timeout_ms: Some(50),
            },
            metrics: MetricsConfig {
                enabled: true,
                namespace: "cfg_test".to_string(),
            },
        };
        let context = config.context_builder().unwrap().build();
        assert_eq!(context.hooks().pending_count(), 0);
    }
}
