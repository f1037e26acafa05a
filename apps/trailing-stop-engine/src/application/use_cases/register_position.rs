//! Register Position Use Case

use std::sync::Arc;

use crate::domain::trailing_stop::{
    ManagedPosition, PositionStateStore, StoreError, TrailingStopConfig, TrailingStopError,
    TrailingStopState, VersionedState,
};

/// Use case placing a newly opened position under trailing-stop management.
pub struct RegisterPositionUseCase<S>
where
    S: PositionStateStore,
{
    store: Arc<S>,
    default_config: TrailingStopConfig,
}

impl<S> RegisterPositionUseCase<S>
where
    S: PositionStateStore,
{
    /// Create a new `RegisterPositionUseCase` using the built-in default config.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_default_config(store, TrailingStopConfig::default())
    }

    /// Create with the config applied by [`Self::execute_with_defaults`].
    pub const fn with_default_config(store: Arc<S>, default_config: TrailingStopConfig) -> Self {
        Self {
            store,
            default_config,
        }
    }

    /// Register `position` with an explicit configuration snapshot.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the position is invalid.
    /// - `AlreadyRegistered` if the position already has state.
    /// - `Store` if the state cannot be persisted.
    pub async fn execute(
        &self,
        position: ManagedPosition,
        config: TrailingStopConfig,
    ) -> Result<VersionedState, TrailingStopError> {
        let state = TrailingStopState::new(position, config).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected trailing stop registration");
        })?;
        let position_id = state.position_id().clone();

        match self.store.create(state).await {
            Ok(record) => {
                tracing::info!(
                    position_id = %position_id,
                    side = %record.state.position().side,
                    entry_price = %record.state.position().entry_price,
                    "Trailing stop registered"
                );
                Ok(record)
            }
            Err(StoreError::AlreadyExists { position_id }) => {
                Err(TrailingStopError::AlreadyRegistered { position_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register `position` with the default configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`].
    pub async fn execute_with_defaults(
        &self,
        position: ManagedPosition,
    ) -> Result<VersionedState, TrailingStopError> {
        self.execute(position, self.default_config).await
    }
}
