//! Tightening Calculator Domain Service
//!
//! Computes the trailing distance and stop price from the peak:
//!
//! ```text
//! gain       = |peak - entry|
//! increments = gain / price_increment        (floored in stepped mode)
//! distance   = max(initial - rate * increments, floor)
//! stop       = peak * (1 - distance)         long
//!            = peak * (1 + distance)         short
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trailing_stop::value_objects::{
    PositionSide, TighteningMode, TrailingStopConfig,
};

/// Distance and stop price derived from one peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLevel {
    /// Fractional distance from the peak.
    pub distance: Decimal,
    /// Absolute stop price.
    pub stop_price: Decimal,
}

/// Pure calculator for progressive trailing-stop levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct TighteningCalculator;

impl TighteningCalculator {
    /// Compute the stop level for `peak_price`.
    ///
    /// Total on validated configs: `price_increment > 0` is guaranteed by
    /// [`TrailingStopConfig`], and arithmetic overflow saturates towards the
    /// floor distance.
    #[must_use]
    pub fn compute(
        entry_price: Decimal,
        peak_price: Decimal,
        side: PositionSide,
        config: &TrailingStopConfig,
    ) -> StopLevel {
        let distance = Self::distance(entry_price, peak_price, config);
        StopLevel {
            distance,
            stop_price: side.stop_from_peak(peak_price, distance),
        }
    }

    /// Trailing distance for a peak, clamped to the floor.
    #[must_use]
    pub fn distance(entry_price: Decimal, peak_price: Decimal, config: &TrailingStopConfig) -> Decimal {
        let gain = (peak_price - entry_price).abs();
        let increments = gain
            .checked_div(config.price_increment())
            .unwrap_or(Decimal::MAX);
        let increments = match config.tightening_mode() {
            TighteningMode::Continuous => increments,
            TighteningMode::Stepped => increments.floor(),
        };
        let reduction = config
            .tightening_rate()
            .checked_mul(increments)
            .unwrap_or(Decimal::MAX);

        config
            .initial_distance()
            .saturating_sub(reduction)
            .max(config.floor_distance())
    }
}
