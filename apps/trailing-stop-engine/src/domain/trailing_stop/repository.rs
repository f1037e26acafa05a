//! Position State Store Trait
//!
//! Persistence abstraction for trailing-stop state. Every write is a
//! compare-and-swap on a per-position version so that concurrent monitors
//! inside one engine process (overlapping ticks, racing workers) never
//! clobber each other and never both emit an exit for the same breach.
//!
//! The bundled stores enforce the compare-and-swap with in-process locks
//! only. Sharing one state directory between engine processes is not
//! supported.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::aggregate::TrailingStopState;
use super::value_objects::TrailingStopStatus;
use crate::domain::shared::PositionId;

/// Stored state together with its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedState {
    /// +1 per successful write. `create` starts at 1, or one past the last
    /// version of a removed record with the same id, so a version number is
    /// never reused for a position.
    pub version: u64,
    /// Trailing-stop state.
    pub state: TrailingStopState,
}

impl VersionedState {
    /// Version assigned by `create` to a never-seen position.
    pub const INITIAL_VERSION: u64 = 1;
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Write applied; the record now carries `version`.
    Written {
        /// New version.
        version: u64,
    },
    /// Stored version differed from the expected one. Nothing was written.
    Conflict {
        /// Version currently stored, or `None` if the record is gone.
        current_version: Option<u64>,
    },
}

impl WriteOutcome {
    /// Whether the write was applied.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// State store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `create` on an id that already has state.
    #[error("state already exists for position {position_id}")]
    AlreadyExists {
        /// Position identifier.
        position_id: String,
    },

    /// Backend unreachable or I/O failed.
    #[error("state store unavailable: {message}")]
    Unavailable {
        /// Backend message.
        message: String,
    },

    /// Stored record could not be decoded.
    #[error("corrupted state for position {position_id}: {message}")]
    Corrupted {
        /// Position identifier.
        position_id: String,
        /// Decode error.
        message: String,
    },
}

/// Versioned trailing-stop state persistence.
///
/// Implementations must make `write_if_version` atomic per position. Locking
/// is per key; a store must never serialize unrelated positions behind one
/// lock for the duration of I/O.
#[async_trait]
pub trait PositionStateStore: Send + Sync {
    /// Insert state for a new position at [`VersionedState::INITIAL_VERSION`],
    /// or one past the last version if the id was removed before.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the position already has state.
    async fn create(&self, state: TrailingStopState) -> Result<VersionedState, StoreError>;

    /// Read the current state and version.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or the record is corrupt.
    async fn read(&self, id: &PositionId) -> Result<Option<VersionedState>, StoreError>;

    /// Replace the state if the stored version equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails. A version mismatch is not an
    /// error; it is reported as [`WriteOutcome::Conflict`].
    async fn write_if_version(
        &self,
        id: &PositionId,
        expected_version: u64,
        state: TrailingStopState,
    ) -> Result<WriteOutcome, StoreError>;

    /// Ids of positions whose status is one of `statuses`, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn list_managed_positions(
        &self,
        statuses: &[TrailingStopStatus],
    ) -> Result<Vec<PositionId>, StoreError>;

    /// Ids of triggered positions whose exit request has not been accepted
    /// by the sink yet, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn list_pending_exits(&self) -> Result<Vec<PositionId>, StoreError>;

    /// Delete state for a position. Returns whether a record was removed.
    /// The removed record's version is kept for a later `create`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn remove(&self, id: &PositionId) -> Result<bool, StoreError>;
}
