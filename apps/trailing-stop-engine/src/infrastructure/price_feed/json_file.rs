//! JSON snapshot price feed.
//!
//! Reads `{"<position-id>": "<price>", ...}` from a file on every fetch, so an
//! external process can publish prices by rewriting the file.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{PriceFeedError, PriceFeedPort};
use crate::domain::shared::PositionId;

/// Price feed backed by a JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonFilePriceFeed {
    path: PathBuf,
}

impl JsonFilePriceFeed {
    /// Create a feed reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn snapshot(&self) -> Result<HashMap<PositionId, Decimal>, PriceFeedError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PriceFeedError::ConnectionError {
                message: format!("{}: {e}", self.path.display()),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Malformed price snapshot");
            PriceFeedError::DataUnavailable
        })
    }
}

#[async_trait]
impl PriceFeedPort for JsonFilePriceFeed {
    async fn get_current_price(&self, position_id: &PositionId) -> Result<Decimal, PriceFeedError> {
        self.snapshot()
            .await?
            .remove(position_id)
            .ok_or_else(|| PriceFeedError::PriceNotFound {
                position_id: position_id.to_string(),
            })
    }

    async fn get_current_prices(
        &self,
        position_ids: &[PositionId],
    ) -> Vec<Result<Decimal, PriceFeedError>> {
        match self.snapshot().await {
            Ok(prices) => position_ids
                .iter()
                .map(|id| {
                    prices
                        .get(id)
                        .copied()
                        .ok_or_else(|| PriceFeedError::PriceNotFound {
                            position_id: id.to_string(),
                        })
                })
                .collect(),
            Err(e) => vec![Err(e); position_ids.len()],
        }
    }
}
