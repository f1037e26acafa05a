//! Trailing Stop Value Objects

mod exit_request;
mod managed_position;
mod position_side;
mod price_observation;
mod trailing_stop_config;
mod trailing_stop_status;

pub use exit_request::{ExitReason, ExitRequest};
pub use managed_position::{ManagedPosition, PositionStatus};
pub use position_side::PositionSide;
pub use price_observation::PriceObservation;
pub use trailing_stop_config::{TighteningMode, TrailingStopConfig};
pub use trailing_stop_status::TrailingStopStatus;
