//! Application Services
//!
//! Long-running background tasks that drive the use cases.

mod monitoring_scheduler;

pub use monitoring_scheduler::MonitoringScheduler;
