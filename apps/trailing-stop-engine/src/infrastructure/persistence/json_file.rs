//! JSON file state store.
//!
//! One document per position under a directory:
//!
//! ```text
//! <dir>/<position-id>.json        {"version": 3, "state": {...}}
//! <dir>/<position-id>.tombstone   3   (last version of a removed position)
//! ```
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous version intact. Each position has its
//! own async lock covering the read-compare-write sequence. The locks live in
//! this process only, so a state directory must not be shared between engine
//! processes.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::shared::PositionId;
use crate::domain::trailing_stop::{
    PositionStateStore, StoreError, TrailingStopState, TrailingStopStatus, VersionedState,
    WriteOutcome,
};

const EXTENSION: &str = "json";
const TOMBSTONE_EXTENSION: &str = "tombstone";
const TEMP_SUFFIX: &str = ".tmp";

/// File-backed implementation of `PositionStateStore`.
#[derive(Debug)]
pub struct JsonFileStateStore {
    dir: PathBuf,
    locks: Mutex<HashMap<PositionId, Arc<AsyncMutex<()>>>>,
}

impl JsonFileStateStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| unavailable(&dir, &e))?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_for(&self, id: &PositionId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop the lock entry for `id` unless another task still holds it.
    fn release_lock(&self, id: &PositionId, lock: Arc<AsyncMutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock();
        if locks.get(id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(id);
        }
    }

    fn path_for(&self, id: &PositionId) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", file_stem(id)))
    }

    fn tombstone_for(&self, id: &PositionId) -> PathBuf {
        self.dir.join(format!("{}.{TOMBSTONE_EXTENSION}", file_stem(id)))
    }

    async fn read_tombstone(&self, id: &PositionId) -> Result<Option<u64>, StoreError> {
        let path = self.tombstone_for(id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, &e)),
        };
        text.trim()
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| StoreError::Corrupted {
                position_id: id.to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }

    async fn ids_where(
        &self,
        keep: impl Fn(&VersionedState) -> bool + Send,
    ) -> Result<Vec<PositionId>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, &e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(&self.dir, &e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match load_file(&path, None).await {
                Ok(Some(record)) if keep(&record) => {
                    ids.push(record.state.position_id().clone());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable state file");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn load(&self, id: &PositionId) -> Result<Option<VersionedState>, StoreError> {
        load_file(&self.path_for(id), Some(id)).await
    }

    async fn persist(&self, record: &VersionedState) -> Result<(), StoreError> {
        let id = record.state.position_id();
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Corrupted {
            position_id: id.to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path_for(id), bytes).await
    }

    /// Write the tombstone, then delete the record. Caller holds the lock.
    async fn remove_locked(&self, id: &PositionId) -> Result<bool, StoreError> {
        let version = match self.load(id).await {
            Ok(Some(record)) => Some(record.version),
            Ok(None) => return Ok(false),
            Err(StoreError::Corrupted { .. }) => None,
            Err(e) => return Err(e),
        };
        if let Some(version) = version {
            write_atomic(&self.tombstone_for(id), version.to_string().into_bytes()).await?;
        }

        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable(&path, &e)),
        }
    }
}

#[async_trait]
impl PositionStateStore for JsonFileStateStore {
    async fn create(&self, state: TrailingStopState) -> Result<VersionedState, StoreError> {
        let id = state.position_id().clone();
        let lock = self.lock_for(&id);
        let _guard = lock.lock().await;

        if self.load(&id).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                position_id: id.to_string(),
            });
        }

        let version = self
            .read_tombstone(&id)
            .await?
            .map_or(VersionedState::INITIAL_VERSION, |last| last + 1);
        let record = VersionedState { version, state };
        self.persist(&record).await?;

        let tombstone = self.tombstone_for(&id);
        match tokio::fs::remove_file(&tombstone).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(unavailable(&tombstone, &e)),
        }
        Ok(record)
    }

    async fn read(&self, id: &PositionId) -> Result<Option<VersionedState>, StoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.load(id).await
    }

    async fn write_if_version(
        &self,
        id: &PositionId,
        expected_version: u64,
        state: TrailingStopState,
    ) -> Result<WriteOutcome, StoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(current) = self.load(id).await? else {
            return Ok(WriteOutcome::Conflict {
                current_version: None,
            });
        };
        if current.version != expected_version {
            return Ok(WriteOutcome::Conflict {
                current_version: Some(current.version),
            });
        }

        let record = VersionedState {
            version: current.version + 1,
            state,
        };
        self.persist(&record).await?;
        Ok(WriteOutcome::Written {
            version: record.version,
        })
    }

    async fn list_managed_positions(
        &self,
        statuses: &[TrailingStopStatus],
    ) -> Result<Vec<PositionId>, StoreError> {
        self.ids_where(|record| statuses.contains(&record.state.status()))
            .await
    }

    async fn list_pending_exits(&self) -> Result<Vec<PositionId>, StoreError> {
        self.ids_where(|record| record.state.exit_pending()).await
    }

    async fn remove(&self, id: &PositionId) -> Result<bool, StoreError> {
        let lock = self.lock_for(id);
        let removed = {
            let _guard = lock.lock().await;
            self.remove_locked(id).await
        };
        self.release_lock(id, lock);
        removed
    }
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    let mut temp = path.to_path_buf().into_os_string();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, bytes)
        .await
        .map_err(|e| unavailable(&temp, &e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| unavailable(path, &e))
}

async fn load_file(
    path: &Path,
    id: Option<&PositionId>,
) -> Result<Option<VersionedState>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(unavailable(path, &e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Corrupted {
            position_id: id.map_or_else(|| path.display().to_string(), ToString::to_string),
            message: e.to_string(),
        })
}

fn unavailable(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Unavailable {
        message: format!("{}: {err}", path.display()),
    }
}

/// File-name-safe encoding of a position id. Bytes outside
/// `[A-Za-z0-9_-]` are written as `%XX`.
fn file_stem(id: &PositionId) -> String {
    let mut stem = String::with_capacity(id.as_str().len());
    for byte in id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trailing_stop::{ManagedPosition, PriceObservation, TrailingStopConfig};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn state(id: &str) -> TrailingStopState {
        TrailingStopState::new(
            ManagedPosition::long(id, dec!(0.60), dec!(100)),
            TrailingStopConfig::default(),
        )
        .unwrap()
    }

    async fn open_store() -> (TempDir, JsonFileStateStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::open(dir.path().join("state"))
            .await
            .unwrap();
        (dir, store)
    }

    #[test]
    fn file_stem_escapes_separators() {
        assert_eq!(file_stem(&PositionId::new("pos-1_a")), "pos-1_a");
        assert_eq!(file_stem(&PositionId::new("a/b.c")), "a%2Fb%2Ec");
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let (dir, store) = open_store().await;
        let id = PositionId::new("pos-1");
        store.create(state("pos-1")).await.unwrap();

        let active = state("pos-1")
            .observe(PriceObservation::now(dec!(0.80)))
            .unwrap()
            .into_next_state()
            .unwrap();
        let outcome = store.write_if_version(&id, 1, active.clone()).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written { version: 2 });
        drop(store);

        let reopened = JsonFileStateStore::open(dir.path().join("state"))
            .await
            .unwrap();
        let record = reopened.read(&id).await.unwrap().unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.state, active);
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let (_dir, store) = open_store().await;
        store.create(state("pos-1")).await.unwrap();
        assert!(matches!(
            store.create(state("pos-1")).await,
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn stale_write_conflicts() {
        let (_dir, store) = open_store().await;
        let id = PositionId::new("pos-1");
        store.create(state("pos-1")).await.unwrap();
        store.write_if_version(&id, 1, state("pos-1")).await.unwrap();

        let outcome = store.write_if_version(&id, 1, state("pos-1")).await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Conflict {
                current_version: Some(2)
            }
        );
    }

    #[tokio::test]
    async fn list_ignores_temp_and_foreign_files() {
        let (_dir, store) = open_store().await;
        store.create(state("pos-b")).await.unwrap();
        store.create(state("pos-a")).await.unwrap();
        tokio::fs::write(store.dir().join("pos-z.json.tmp"), b"partial")
            .await
            .unwrap();
        tokio::fs::write(store.dir().join("notes.txt"), b"hello")
            .await
            .unwrap();

        let ids = store
            .list_managed_positions(&TrailingStopStatus::MONITORED)
            .await
            .unwrap();
        assert_eq!(ids, vec![PositionId::new("pos-a"), PositionId::new("pos-b")]);
    }

    #[tokio::test]
    async fn corrupted_record_is_reported() {
        let (_dir, store) = open_store().await;
        tokio::fs::write(store.dir().join("pos-1.json"), b"{not json")
            .await
            .unwrap();

        let err = store.read(&PositionId::new("pos-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn recreate_after_remove_continues_versions() {
        let (dir, store) = open_store().await;
        let id = PositionId::new("pos-1");
        store.create(state("pos-1")).await.unwrap();
        store.write_if_version(&id, 1, state("pos-1")).await.unwrap();
        assert!(store.remove(&id).await.unwrap());
        drop(store);

        let store = JsonFileStateStore::open(dir.path().join("state"))
            .await
            .unwrap();
        let record = store.create(state("pos-1")).await.unwrap();
        assert_eq!(record.version, 3);
        assert!(!store.dir().join("pos-1.tombstone").exists());

        let stale = store.write_if_version(&id, 1, state("pos-1")).await.unwrap();
        assert_eq!(
            stale,
            WriteOutcome::Conflict {
                current_version: Some(3)
            }
        );
    }

    #[tokio::test]
    async fn remove_keeps_lock_shared_with_a_waiter() {
        let (_dir, store) = open_store().await;
        let id = PositionId::new("pos-1");
        store.create(state("pos-1")).await.unwrap();

        let waiter = store.lock_for(&id);
        assert!(store.remove(&id).await.unwrap());
        assert!(Arc::ptr_eq(&waiter, &store.lock_for(&id)));

        drop(waiter);
        assert!(!store.remove(&id).await.unwrap());
        assert!(store.locks.lock().get(&id).is_none());
    }

    #[tokio::test]
    async fn pending_exits_lists_undelivered_triggers() {
        let (_dir, store) = open_store().await;
        let triggered = state("pos-1")
            .observe(PriceObservation::now(dec!(0.80)))
            .unwrap()
            .into_next_state()
            .unwrap()
            .observe(PriceObservation::now(dec!(0.50)))
            .unwrap()
            .into_next_state()
            .unwrap();
        store.create(triggered.clone()).await.unwrap();
        store.create(state("pos-2")).await.unwrap();

        let id = PositionId::new("pos-1");
        assert_eq!(store.list_pending_exits().await.unwrap(), vec![id.clone()]);

        store
            .write_if_version(&id, 1, triggered.with_exit_delivered().unwrap())
            .await
            .unwrap();
        assert!(store.list_pending_exits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let (_dir, store) = open_store().await;
        let id = PositionId::new("pos-1");
        store.create(state("pos-1")).await.unwrap();

        assert!(store.remove(&id).await.unwrap());
        assert!(!store.remove(&id).await.unwrap());
        assert!(store.read(&id).await.unwrap().is_none());
    }
}
