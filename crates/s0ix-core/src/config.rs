//! Tracker configuration.
//!
//! Layered as defaults → optional JSON file → `S0IX_*` environment variables;
//! the CLI applies its own flags on top and calls [`Config::validate`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix for every option.
pub const ENV_PREFIX: &str = "S0IX_";

/// Sampling, aggregation and state-machine thresholds.
///
/// The default poll interval of one second resolves idle episodes down to a
/// few seconds while costing one small sysfs read per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Sampling period in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of recent full-confidence samples in the rolling window.
    pub window_size: usize,
    /// Consecutive `SourceUnavailable` reads before entering degraded mode.
    pub failure_threshold: u32,
    /// Upper bound on the backed-off polling interval, milliseconds.
    pub backoff_ceiling_ms: u64,
    /// Residency share (percent of a sample) counted as full deep idle.
    pub deep_idle_tolerance_pct: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            window_size: 60,
            failure_threshold: 5,
            backoff_ceiling_ms: 60_000,
            deep_idle_tolerance_pct: 95.0,
        }
    }
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{var}: cannot parse {value:?}")]
    Env { var: String, value: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Config {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `S0IX_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply variables from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_vars(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                var: var.to_string(),
                value: value.to_string(),
            })
        }

        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|v| (name, v))
        };

        if let Some((name, v)) = var("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("WINDOW_SIZE") {
            self.window_size = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("FAILURE_THRESHOLD") {
            self.failure_threshold = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("BACKOFF_CEILING_MS") {
            self.backoff_ceiling_ms = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("DEEP_IDLE_TOLERANCE_PCT") {
            self.deep_idle_tolerance_pct = parse(&name, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be positive"));
        }
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be positive"));
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure_threshold", "must be positive"));
        }
        if self.backoff_ceiling_ms < self.poll_interval_ms {
            return Err(invalid(
                "backoff_ceiling_ms",
                format!(
                    "{} is below poll_interval_ms {}",
                    self.backoff_ceiling_ms, self.poll_interval_ms
                ),
            ));
        }
        let tol = self.deep_idle_tolerance_pct;
        if !tol.is_finite() || tol <= 0.0 || tol > 100.0 {
            return Err(invalid(
                "deep_idle_tolerance_pct",
                format!("{tol} is outside (0, 100]"),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }
}
