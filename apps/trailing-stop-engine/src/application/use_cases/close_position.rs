//! Close Position Use Case

use std::sync::Arc;

use crate::domain::shared::PositionId;
use crate::domain::trailing_stop::{PositionStateStore, TrailingStopError};

/// Use case dropping trailing-stop state once the owning position is closed.
pub struct ClosePositionUseCase<S>
where
    S: PositionStateStore,
{
    store: Arc<S>,
}

impl<S> ClosePositionUseCase<S>
where
    S: PositionStateStore,
{
    /// Create a new `ClosePositionUseCase`.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Remove state for `position_id`. Returns whether a record existed.
    ///
    /// Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the backend fails.
    pub async fn execute(&self, position_id: &PositionId) -> Result<bool, TrailingStopError> {
        let removed = self.store.remove(position_id).await?;
        if removed {
            tracing::info!(position_id = %position_id, "Trailing stop state archived");
        } else {
            tracing::debug!(position_id = %position_id, "No trailing stop state to archive");
        }
        Ok(removed)
    }
}
