//! Prometheus metrics for the trailing-stop engine.
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! monitor can call them unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use trailing_stop_engine::config::MetricsConfig;
//! use trailing_stop_engine::observability::init_metrics;
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_transition("activated");
//! ```

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Tick duration buckets, 1ms to 10s.
const TICK_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or the exporter fails
/// to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    let addr: std::net::SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| MetricsError::Configuration(format!("{}: {e}", config.listen_addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(TICK_DURATION_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Record a persisted state transition (`activated`, `tightened`, `triggered`).
pub fn record_transition(kind: &'static str) {
    counter!("trailing_stop_transitions_total", "kind" => kind).increment(1);
}

/// Record the wall-clock duration of one monitoring tick.
pub fn record_tick_duration(seconds: f64) {
    histogram!("trailing_stop_tick_duration_seconds").record(seconds);
}

/// Record an exit request hand-off.
pub fn record_exit_request(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!("trailing_stop_exit_requests_total", "outcome" => outcome).increment(1);
}

/// Record a per-position monitoring error.
///
/// # Arguments
///
/// * `kind` - `price_feed`, `store`, `timeout`, `invalid_price` or `invariant_violation`
pub fn record_monitor_error(kind: &'static str) {
    counter!("trailing_stop_errors_total", "kind" => kind).increment(1);
}

/// Record a lost version race on a state write.
pub fn record_conflict() {
    counter!("trailing_stop_write_conflicts_total").increment(1);
}
