//! In-memory state store for testing and development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::shared::PositionId;
use crate::domain::trailing_stop::{
    PositionStateStore, StoreError, TrailingStopState, TrailingStopStatus, VersionedState,
    WriteOutcome,
};

/// In-memory implementation of `PositionStateStore`.
///
/// Compare-and-swap happens under the write lock, which is never held across
/// an await point. State does not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<PositionId, VersionedState>,
    /// Last version of each removed position.
    tombstones: HashMap<PositionId, u64>,
}

impl InMemoryStateStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().states.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().states.is_empty()
    }

    fn ids_where(&self, keep: impl Fn(&VersionedState) -> bool) -> Vec<PositionId> {
        let inner = self.inner.read();
        let mut ids: Vec<PositionId> = inner
            .states
            .iter()
            .filter(|(_, record)| keep(*record))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Snapshot of one record (for assertions).
    #[must_use]
    pub fn get(&self, id: &PositionId) -> Option<VersionedState> {
        self.inner.read().states.get(id).cloned()
    }
}

#[async_trait]
impl PositionStateStore for InMemoryStateStore {
    async fn create(&self, state: TrailingStopState) -> Result<VersionedState, StoreError> {
        let mut inner = self.inner.write();
        let id = state.position_id().clone();
        if inner.states.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                position_id: id.to_string(),
            });
        }

        let version = inner
            .tombstones
            .remove(&id)
            .map_or(VersionedState::INITIAL_VERSION, |last| last + 1);
        let record = VersionedState { version, state };
        inner.states.insert(id, record.clone());
        Ok(record)
    }

    async fn read(&self, id: &PositionId) -> Result<Option<VersionedState>, StoreError> {
        Ok(self.inner.read().states.get(id).cloned())
    }

    async fn write_if_version(
        &self,
        id: &PositionId,
        expected_version: u64,
        state: TrailingStopState,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.inner.write();
        let Some(record) = inner.states.get_mut(id) else {
            return Ok(WriteOutcome::Conflict {
                current_version: None,
            });
        };

        if record.version != expected_version {
            return Ok(WriteOutcome::Conflict {
                current_version: Some(record.version),
            });
        }

        record.version += 1;
        record.state = state;
        Ok(WriteOutcome::Written {
            version: record.version,
        })
    }

    async fn list_managed_positions(
        &self,
        statuses: &[TrailingStopStatus],
    ) -> Result<Vec<PositionId>, StoreError> {
        Ok(self.ids_where(|record| statuses.contains(&record.state.status())))
    }

    async fn list_pending_exits(&self) -> Result<Vec<PositionId>, StoreError> {
        Ok(self.ids_where(|record| record.state.exit_pending()))
    }

    async fn remove(&self, id: &PositionId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(record) = inner.states.remove(id) else {
            return Ok(false);
        };
        inner.tombstones.insert(id.clone(), record.version);
        Ok(true)
    }
}
