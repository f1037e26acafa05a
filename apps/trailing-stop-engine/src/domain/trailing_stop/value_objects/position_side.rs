//! Position Side Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position. Determines which way is "favorable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Long position: profits when price rises.
    Long,
    /// Short position: profits when price falls.
    Short,
}

impl PositionSide {
    /// Whether `candidate` is strictly more favorable than `reference`.
    #[must_use]
    pub fn is_better(self, candidate: Decimal, reference: Decimal) -> bool {
        match self {
            Self::Long => candidate > reference,
            Self::Short => candidate < reference,
        }
    }

    /// Whether `current_price` has crossed `stop_price` against the holder.
    ///
    /// Touching the stop exactly is not a breach.
    #[must_use]
    pub fn breaches(self, current_price: Decimal, stop_price: Decimal) -> bool {
        match self {
            Self::Long => current_price < stop_price,
            Self::Short => current_price > stop_price,
        }
    }

    /// Signed fractional gain of `current_price` relative to `entry_price`.
    ///
    /// Returns `None` when `entry_price` is zero.
    #[must_use]
    pub fn gain_fraction(self, entry_price: Decimal, current_price: Decimal) -> Option<Decimal> {
        let move_in_favor = match self {
            Self::Long => current_price - entry_price,
            Self::Short => entry_price - current_price,
        };
        move_in_favor.checked_div(entry_price)
    }

    /// Stop price sitting `distance` away from `peak_price`, on the losing side.
    #[must_use]
    pub fn stop_from_peak(self, peak_price: Decimal, distance: Decimal) -> Decimal {
        match self {
            Self::Long => peak_price * (Decimal::ONE - distance),
            Self::Short => peak_price * (Decimal::ONE + distance),
        }
    }

    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
