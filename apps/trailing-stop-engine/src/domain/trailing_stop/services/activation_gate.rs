//! Activation Gate Domain Service

use rust_decimal::Decimal;

use crate::domain::trailing_stop::value_objects::{PositionSide, TrailingStopConfig};

/// Decides when a dormant trailing stop starts tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationGate;

impl ActivationGate {
    /// Whether the gain of `current_price` over `entry_price` has reached the
    /// configured activation threshold.
    ///
    /// The threshold is inclusive. `entry_price` must be positive (enforced at
    /// registration); a zero entry price yields `false`.
    #[must_use]
    pub fn should_activate(
        entry_price: Decimal,
        side: PositionSide,
        current_price: Decimal,
        config: &TrailingStopConfig,
    ) -> bool {
        side.gain_fraction(entry_price, current_price)
            .is_some_and(|gain| gain >= config.activation_threshold())
    }
}
