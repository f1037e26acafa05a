//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod close_position;
mod monitor_trailing_stops;
mod register_position;

pub use close_position::ClosePositionUseCase;
pub use monitor_trailing_stops::{
    MonitorError, MonitorSettings, MonitorTrailingStopsUseCase, PositionOutcome, TickReport,
};
pub use register_position::RegisterPositionUseCase;
