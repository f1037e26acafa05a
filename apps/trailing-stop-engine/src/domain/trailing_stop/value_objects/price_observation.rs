//! Price Observation Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Timestamp;

/// A market price sampled for one position at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Observed price.
    pub price: Decimal,
    /// When the price was observed.
    pub observed_at: Timestamp,
}

impl PriceObservation {
    /// Create an observation.
    #[must_use]
    pub const fn new(price: Decimal, observed_at: Timestamp) -> Self {
        Self { price, observed_at }
    }

    /// Create an observation stamped with the current time.
    #[must_use]
    pub fn now(price: Decimal) -> Self {
        Self::new(price, Timestamp::now())
    }
}
