//! Trailing Stop Errors

use rust_decimal::Decimal;
use thiserror::Error;

use super::repository::StoreError;

/// Rejections raised when a trailing-stop configuration or position is
/// registered with the engine.
///
/// These never occur during monitoring: a value that fails here is refused
/// before it can reach the calculators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Floor distance is wider than the initial distance.
    #[error("floor_distance ({floor}) must not exceed initial_distance ({initial})")]
    FloorExceedsInitial {
        /// Configured floor distance.
        floor: Decimal,
        /// Configured initial distance.
        initial: Decimal,
    },

    /// A distance fraction lies outside the open interval (0, 1).
    #[error("{field} must be in (0, 1), got {value}")]
    DistanceOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },

    /// Price increment is zero or negative.
    #[error("price_increment must be positive, got {value}")]
    NonPositivePriceIncrement {
        /// Offending value.
        value: Decimal,
    },

    /// Activation threshold is negative.
    #[error("activation_threshold must be >= 0, got {value}")]
    NegativeActivationThreshold {
        /// Offending value.
        value: Decimal,
    },

    /// Tightening rate is negative.
    #[error("tightening_rate must be >= 0, got {value}")]
    NegativeTighteningRate {
        /// Offending value.
        value: Decimal,
    },

    /// Position entry price is zero or negative.
    #[error("position {position_id}: entry_price must be positive, got {value}")]
    NonPositiveEntryPrice {
        /// Position identifier.
        position_id: String,
        /// Offending value.
        value: Decimal,
    },

    /// Position quantity is zero or negative.
    #[error("position {position_id}: quantity must be positive, got {value}")]
    NonPositiveQuantity {
        /// Position identifier.
        position_id: String,
        /// Offending value.
        value: Decimal,
    },

    /// Position is already closed.
    #[error("position {position_id} is closed")]
    PositionClosed {
        /// Position identifier.
        position_id: String,
    },
}

/// Errors raised by the trailing-stop bounded context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrailingStopError {
    /// Configuration or position rejected at registration.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Position already has trailing-stop state.
    #[error("position already registered: {position_id}")]
    AlreadyRegistered {
        /// Position identifier.
        position_id: String,
    },

    /// Observed price cannot be used (zero or negative).
    #[error("invalid price observation for {position_id}: {price}")]
    InvalidObservation {
        /// Position identifier.
        position_id: String,
        /// Observed price.
        price: Decimal,
    },

    /// A computed value broke a ratchet or bounds invariant.
    ///
    /// Indicates a calculator bug. Never clamped away.
    #[error("invariant violation for {position_id}: {message}")]
    InvariantViolation {
        /// Position identifier.
        position_id: String,
        /// What was violated.
        message: String,
    },

    /// State store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
