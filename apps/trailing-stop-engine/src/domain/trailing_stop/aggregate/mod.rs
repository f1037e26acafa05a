//! Trailing Stop Aggregate

mod trailing_stop_state;

pub use trailing_stop_state::{ActiveStop, Transition, TrailingStopState, TriggerRecord};
