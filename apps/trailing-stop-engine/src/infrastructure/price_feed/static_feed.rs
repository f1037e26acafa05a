//! Static price feed for tests and the dev harness.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{PriceFeedError, PriceFeedPort};
use crate::domain::shared::PositionId;

/// Price feed returning prices set by the caller.
///
/// A position can be told to fail or to stall, which exercises the monitor's
/// transient-error and timeout paths.
#[derive(Debug, Default)]
pub struct StaticPriceFeed {
    prices: RwLock<HashMap<PositionId, Decimal>>,
    failing: RwLock<HashMap<PositionId, PriceFeedError>>,
    delays: RwLock<HashMap<PositionId, Duration>>,
}

impl StaticPriceFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price for a position.
    pub fn set_price(&self, position_id: impl Into<PositionId>, price: Decimal) {
        self.prices.write().insert(position_id.into(), price);
    }

    /// Make every fetch for a position fail with `error`.
    pub fn fail_with(&self, position_id: impl Into<PositionId>, error: PriceFeedError) {
        self.failing.write().insert(position_id.into(), error);
    }

    /// Delay every fetch for a position.
    pub fn delay(&self, position_id: impl Into<PositionId>, delay: Duration) {
        self.delays.write().insert(position_id.into(), delay);
    }

    /// Clear injected failures and delays for a position.
    pub fn recover(&self, position_id: &PositionId) {
        self.failing.write().remove(position_id);
        self.delays.write().remove(position_id);
    }
}

#[async_trait]
impl PriceFeedPort for StaticPriceFeed {
    async fn get_current_price(&self, position_id: &PositionId) -> Result<Decimal, PriceFeedError> {
        let delay = self.delays.read().get(position_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failing.read().get(position_id) {
            return Err(error.clone());
        }

        self.prices
            .read()
            .get(position_id)
            .copied()
            .ok_or_else(|| PriceFeedError::PriceNotFound {
                position_id: position_id.to_string(),
            })
    }
}
