//! Configuration module for the trailing-stop engine.
//!
//! Loads YAML with environment variable interpolation and validates it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trailing_stop_engine::config::load_config;
//!
//! let config = load_config("config.yaml")?;
//! println!("tick interval: {}ms", config.monitor.interval_ms);
//! ```
//!
//! # Example
//!
//! ```yaml
//! monitor:
//!   interval_ms: 500
//!   max_concurrency: 32
//! persistence:
//!   backend: json_file
//!   state_dir: ${TRAILING_STOP_STATE_DIR:-./data/trailing-stops}
//! default_trailing_stop:
//!   activation_threshold: "0.10"
//!   initial_distance: "0.05"
//!   tightening_rate: "0.01"
//!   floor_distance: "0.02"
//!   price_increment: "0.10"
//!   tightening_mode: continuous
//! positions:
//!   - id: pos-1
//!     side: long
//!     entry_price: "0.60"
//!     quantity: "100"
//! ```

mod monitor;
mod observability;
mod persistence;
mod price_feed;

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::trailing_stop::{ManagedPosition, TrailingStopConfig};

pub use monitor::MonitorConfig;
pub use observability::{LogFormat, LoggingConfig, MetricsConfig, ObservabilityConfig};
pub use persistence::{PersistenceBackend, PersistenceConfig};
pub use price_feed::PriceFeedConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Monitoring loop.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// State store.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Price source.
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Trailing-stop parameters applied to positions registered without
    /// their own.
    #[serde(default)]
    pub default_trailing_stop: TrailingStopConfig,
    /// Positions registered at startup with `default_trailing_stop`.
    /// Already-registered ids are left as they are.
    #[serde(default)]
    pub positions: Vec<ManagedPosition>,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    load_config_from_string(&contents)
}

/// Like [`load_config`], but a missing file yields the defaults.
///
/// # Errors
///
/// Returns a `ConfigError` if the file exists but cannot be read, parsed,
/// or validated.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    match load_config(path) {
        Err(ConfigError::ReadError { source, .. }) if source.kind() == ErrorKind::NotFound => {
            let config = Config::default();
            validate_config(&config)?;
            Ok(config)
        }
        other => other,
    }
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset or empty
/// variables without a default become the empty string.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let default_value = caps.get(2).map_or("", |m| m.as_str());
        match std::env::var(&caps[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let monitor = &config.monitor;

    if monitor.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.interval_ms must be positive".to_string(),
        ));
    }

    if monitor.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.max_concurrency must be at least 1".to_string(),
        ));
    }

    let timeouts = [
        monitor.price_timeout_ms,
        monitor.store_timeout_ms,
        monitor.exit_timeout_ms,
    ];
    if timeouts.contains(&0) {
        return Err(ConfigError::ValidationError(
            "monitor timeouts (price, store, exit) must be positive".to_string(),
        ));
    }

    if monitor.exit_retry_ms < monitor.exit_timeout_ms {
        return Err(ConfigError::ValidationError(format!(
            "monitor.exit_retry_ms ({}) must be at least monitor.exit_timeout_ms ({})",
            monitor.exit_retry_ms, monitor.exit_timeout_ms
        )));
    }

    if config.persistence.backend == PersistenceBackend::JsonFile
        && config.persistence.state_dir.trim().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "persistence.state_dir is required for the json_file backend".to_string(),
        ));
    }

    if config.price_feed.snapshot_path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "price_feed.snapshot_path must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(config.positions.len());
    for position in &config.positions {
        position
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if !seen.insert(&position.id) {
            return Err(ConfigError::ValidationError(format!(
                "positions: duplicate id {}",
                position.id
            )));
        }
    }

    let metrics = &config.observability.metrics;
    if metrics.enabled && metrics.listen_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "observability.metrics.listen_addr is not a socket address: {}",
            metrics.listen_addr
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trailing_stop::{PositionSide, TighteningMode};
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.monitor.interval_ms, 1000);
        assert_eq!(config.monitor.max_concurrency, 16);
        assert_eq!(config.monitor.max_conflict_retries, 3);
        assert_eq!(config.persistence.backend, PersistenceBackend::JsonFile);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
        assert!(!config.observability.metrics.enabled);
        assert_eq!(config.default_trailing_stop, TrailingStopConfig::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = load_config_from_string("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_minimal_config() {
        let yaml = r"
monitor:
  interval_ms: 250
";
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.monitor.interval_ms, 250);
        assert_eq!(config.monitor.max_concurrency, 16);
        assert_eq!(config.monitor.interval(), std::time::Duration::from_millis(250));
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "dir: ${TRAILING_STOP_CONFIG_TEST_NONEXISTENT_VAR:-/tmp/state}";
        assert_eq!(interpolate_env_vars(input), "dir: /tmp/state");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);

        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "listen_addr: ${TRAILING_STOP_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        assert_eq!(interpolate_env_vars(input), "listen_addr: ");
    }

    #[test]
    fn test_validation_zero_interval() {
        let yaml = r"
monitor:
  interval_ms: 0
";
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(err.to_string().contains("interval_ms"));
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let yaml = r"
monitor:
  max_concurrency: 0
";
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_validation_exit_retry_shorter_than_timeout() {
        let yaml = r"
monitor:
  exit_timeout_ms: 5000
  exit_retry_ms: 1000
";
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("exit_retry_ms"));
    }

    #[test]
    fn test_validation_bad_metrics_addr() {
        let yaml = r#"
observability:
  metrics:
    enabled: true
    listen_addr: "nowhere"
"#;
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(err.to_string().contains("listen_addr"));
    }

    #[test]
    fn test_invalid_trailing_stop_is_parse_error() {
        let yaml = r#"
default_trailing_stop:
  activation_threshold: "0.10"
  initial_distance: "0.02"
  tightening_rate: "0.01"
  floor_distance: "0.05"
"#;
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().contains("floor_distance"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());

        let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r#"
monitor:
  interval_ms: 500
  max_concurrency: 8
  max_conflict_retries: 5
  price_timeout_ms: 750
  store_timeout_ms: 1500
  exit_timeout_ms: 3000
  exit_retry_ms: 30000

persistence:
  backend: in_memory

price_feed:
  snapshot_path: "/var/lib/prices.json"

observability:
  logging:
    level: "debug"
    format: "pretty"
  metrics:
    enabled: true
    listen_addr: "127.0.0.1:9100"

default_trailing_stop:
  activation_threshold: "0.05"
  initial_distance: "0.08"
  tightening_rate: "0.02"
  floor_distance: "0.03"
  price_increment: "0.25"
  tightening_mode: stepped
"#;

        let config = load_config_from_string(yaml).unwrap();

        assert_eq!(config.monitor.max_conflict_retries, 5);
        let settings = config.monitor.settings();
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.price_timeout, std::time::Duration::from_millis(750));
        assert_eq!(settings.exit_timeout, std::time::Duration::from_secs(3));
        assert_eq!(settings.exit_retry_after, std::time::Duration::from_secs(30));
        assert_eq!(config.persistence.backend, PersistenceBackend::InMemory);
        assert_eq!(config.price_feed.snapshot_path, "/var/lib/prices.json");
        assert_eq!(config.observability.logging.level, "debug");
        assert_eq!(config.observability.logging.format, LogFormat::Pretty);
        assert!(config.observability.metrics.enabled);

        let stop = config.default_trailing_stop;
        assert_eq!(stop.activation_threshold(), dec!(0.05));
        assert_eq!(stop.floor_distance(), dec!(0.03));
        assert_eq!(stop.price_increment(), dec!(0.25));
        assert_eq!(stop.tightening_mode(), TighteningMode::Stepped);
    }

    #[test]
    fn test_startup_positions() {
        let yaml = r#"
positions:
  - id: pos-1
    side: long
    entry_price: "0.60"
    quantity: "100"
  - id: pos-2
    side: short
    entry_price: "12.5"
    quantity: "3"
"#;
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.positions.len(), 2);
        assert_eq!(config.positions[1].side, PositionSide::Short);
        assert_eq!(config.positions[1].entry_price, dec!(12.5));
    }

    #[test]
    fn test_invalid_startup_position_is_rejected() {
        let yaml = r#"
positions:
  - id: pos-1
    side: long
    entry_price: "0"
    quantity: "100"
"#;
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(err.to_string().contains("entry_price"));
    }

    #[test]
    fn test_duplicate_startup_position_is_rejected() {
        let yaml = r#"
positions:
  - id: pos-1
    side: long
    entry_price: "0.60"
    quantity: "100"
  - id: pos-1
    side: short
    entry_price: "0.70"
    quantity: "5"
"#;
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate id pos-1"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = load_config_from_string(include_str!("../../config.example.yaml")).unwrap();
        assert_eq!(config.default_trailing_stop, TrailingStopConfig::default());
        assert_eq!(config.persistence.backend, PersistenceBackend::JsonFile);
        assert_eq!(config.positions.len(), 1);
    }
}
