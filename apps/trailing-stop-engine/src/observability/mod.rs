//! Observability module for metrics and logging.

mod metrics;
pub mod telemetry;

pub use metrics::{
    MetricsError, init_metrics, record_conflict, record_exit_request, record_monitor_error,
    record_tick_duration, record_transition,
};
pub use telemetry::init_telemetry;
