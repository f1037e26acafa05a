//! Monitoring loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::MonitorSettings;

/// Monitoring loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Positions processed concurrently per tick.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Re-read attempts after a version conflict before deferring.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Price fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub price_timeout_ms: u64,
    /// State store operation timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Exit hand-off timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub exit_timeout_ms: u64,
    /// Delay before an undelivered exit is attempted again, in milliseconds.
    /// Must not be shorter than `exit_timeout_ms`.
    #[serde(default = "default_exit_retry_ms")]
    pub exit_retry_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_concurrency: default_max_concurrency(),
            max_conflict_retries: default_max_conflict_retries(),
            price_timeout_ms: default_timeout_ms(),
            store_timeout_ms: default_timeout_ms(),
            exit_timeout_ms: default_timeout_ms(),
            exit_retry_ms: default_exit_retry_ms(),
        }
    }
}

impl MonitorConfig {
    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Per-tick settings for the monitor use case.
    #[must_use]
    pub const fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            max_concurrency: self.max_concurrency,
            max_conflict_retries: self.max_conflict_retries,
            price_timeout: Duration::from_millis(self.price_timeout_ms),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            exit_timeout: Duration::from_millis(self.exit_timeout_ms),
            exit_retry_after: Duration::from_millis(self.exit_retry_ms),
        }
    }
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_max_concurrency() -> usize {
    16
}

const fn default_max_conflict_retries() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    2000
}

const fn default_exit_retry_ms() -> u64 {
    10_000
}
