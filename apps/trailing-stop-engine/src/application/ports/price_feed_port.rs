//! Price Feed Port (Driven Port)
//!
//! Interface for reading the latest market price of a managed position.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::shared::PositionId;

/// Price feed error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceFeedError {
    /// Connection error.
    #[error("Price feed connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// No price known for the position.
    #[error("No price for position: {position_id}")]
    PriceNotFound {
        /// Position without a price.
        position_id: String,
    },

    /// Data unavailable.
    #[error("Price data unavailable")]
    DataUnavailable,
}

/// Port for reading current prices.
#[async_trait]
pub trait PriceFeedPort: Send + Sync {
    /// Latest price for a position's instrument.
    ///
    /// # Errors
    ///
    /// Returns error if no usable price can be obtained.
    async fn get_current_price(&self, position_id: &PositionId) -> Result<Decimal, PriceFeedError>;

    /// Latest prices for several positions, one result per id in order.
    async fn get_current_prices(
        &self,
        position_ids: &[PositionId],
    ) -> Vec<Result<Decimal, PriceFeedError>> {
        let mut prices = Vec::with_capacity(position_ids.len());
        for id in position_ids {
            prices.push(self.get_current_price(id).await);
        }
        prices
    }
}
