//! Configuration loading for the thermostat console.
//!
//! Configuration is loaded from a TOML file (default: `thermostat.toml`).
//! Every key is optional, and a missing default file means all defaults.

use serde::Deserialize;
use setpoint_sync_client::{EngineConfig, SimulatorConfig};
use setpoint_sync_core::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the console.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Sync engine configuration.
    #[serde(default)]
    pub engine: EngineSection,
    /// Simulated authority configuration.
    #[serde(default)]
    pub simulator: SimulatorSection,
}

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineSection {
    /// Per-call timeout in milliseconds (default: none).
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Abandon a command after this many failures (default: never).
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Flush failed commands in the background (default: false).
    #[serde(default)]
    pub auto_retry: bool,
    /// First retry delay in milliseconds (default: 1000).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Cap on the retry delay in milliseconds (default: 30000).
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    /// Maximum random jitter in milliseconds (default: 1000).
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
}

/// Simulated authority configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorSection {
    /// Minimum set-target latency in milliseconds (default: 500).
    #[serde(default = "default_set_latency_min_ms")]
    pub set_latency_min_ms: u64,
    /// Maximum set-target latency in milliseconds (default: 2000).
    #[serde(default = "default_set_latency_max_ms")]
    pub set_latency_max_ms: u64,
    /// Minimum fetch latency in milliseconds (default: 300).
    #[serde(default = "default_fetch_latency_min_ms")]
    pub fetch_latency_min_ms: u64,
    /// Maximum fetch latency in milliseconds (default: 1000).
    #[serde(default = "default_fetch_latency_max_ms")]
    pub fetch_latency_max_ms: u64,
    /// Probability that a set-target call fails (default: 0.1).
    #[serde(default = "default_set_failure_rate")]
    pub set_failure_rate: f64,
    /// Probability that a fetch fails (default: 0.05).
    #[serde(default = "default_fetch_failure_rate")]
    pub fetch_failure_rate: f64,
    /// Lowest reported temperature (default: 20.0).
    #[serde(default = "default_min_temp")]
    pub min_temp: f64,
    /// Highest reported temperature (default: 25.0).
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
}

// Default value functions
fn default_retry_base_ms() -> u64 {
    1000
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_retry_jitter_ms() -> u64 {
    1000
}

fn default_set_latency_min_ms() -> u64 {
    500
}

fn default_set_latency_max_ms() -> u64 {
    2000
}

fn default_fetch_latency_min_ms() -> u64 {
    300
}

fn default_fetch_latency_max_ms() -> u64 {
    1000
}

fn default_set_failure_rate() -> f64 {
    0.1
}

fn default_fetch_failure_rate() -> f64 {
    0.05
}

fn default_min_temp() -> f64 {
    20.0
}

fn default_max_temp() -> f64 {
    25.0
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            max_attempts: None,
            auto_retry: false,
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
        }
    }
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            set_latency_min_ms: default_set_latency_min_ms(),
            set_latency_max_ms: default_set_latency_max_ms(),
            fetch_latency_min_ms: default_fetch_latency_min_ms(),
            fetch_latency_max_ms: default_fetch_latency_max_ms(),
            set_failure_rate: default_set_failure_rate(),
            fetch_failure_rate: default_fetch_failure_rate(),
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if given, otherwise the default file if it exists.
    ///
    /// An explicitly requested file must exist.
    pub fn load(path: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if default_path.exists() => Self::from_file(default_path),
            None => Ok(Self::default()),
        }
    }
}

impl EngineSection {
    /// Build the engine configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut retry = RetryPolicy::unbounded()
            .with_delays(
                Duration::from_millis(self.retry_base_ms),
                Duration::from_millis(self.retry_max_ms),
            )
            .with_jitter(Duration::from_millis(self.retry_jitter_ms));
        if let Some(attempts) = self.max_attempts {
            retry = retry.with_max_attempts(attempts);
        }

        let mut config = EngineConfig::default()
            .with_retry_policy(retry)
            .with_auto_retry(self.auto_retry);
        if let Some(timeout_ms) = self.request_timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(timeout_ms));
        }
        config
    }
}

impl SimulatorSection {
    /// Build the simulator configuration.
    ///
    /// Inverted bounds are swapped rather than rejected.
    pub fn to_simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            set_latency: millis_range(self.set_latency_min_ms, self.set_latency_max_ms),
            fetch_latency: millis_range(self.fetch_latency_min_ms, self.fetch_latency_max_ms),
            set_failure_rate: self.set_failure_rate,
            fetch_failure_rate: self.fetch_failure_rate,
            current_temp: self.min_temp.min(self.max_temp)..=self.max_temp.max(self.min_temp),
            ..SimulatorConfig::default()
        }
    }
}

fn millis_range(a: u64, b: u64) -> std::ops::RangeInclusive<Duration> {
    Duration::from_millis(a.min(b))..=Duration::from_millis(a.max(b))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
