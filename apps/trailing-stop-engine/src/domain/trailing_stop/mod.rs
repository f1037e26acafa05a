//! Trailing Stop Bounded Context
//!
//! Progressive trailing stop for open positions: a dormant stop activates
//! once the position has gained enough, then follows the best price seen,
//! narrowing its distance as the gain grows, until a breach triggers an exit.
//!
//! # Lifecycle
//!
//! ```text
//! Inactive ──gain >= threshold──▶ Active ──breach──▶ Triggered
//!                                  │  ▲
//!                                  └──┘ new peak (tighten)
//! ```
//!
//! The stop never moves against the position and the distance never widens.

pub mod aggregate;
pub mod errors;
pub mod repository;
pub mod services;
pub mod value_objects;

pub use aggregate::{ActiveStop, Transition, TrailingStopState, TriggerRecord};
pub use errors::{ConfigurationError, TrailingStopError};
pub use repository::{PositionStateStore, StoreError, VersionedState, WriteOutcome};
pub use services::{ActivationGate, StopLevel, TighteningCalculator};
pub use value_objects::{
    ExitReason, ExitRequest, ManagedPosition, PositionSide, PositionStatus, PriceObservation,
    TighteningMode, TrailingStopConfig, TrailingStopStatus,
};
