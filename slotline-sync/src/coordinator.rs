//! Last-write-wins mirroring of the local store.
//!
//! A push uploads every syncable key as one snapshot stamped with the push
//! time. A pull adopts the remote snapshot only when it is strictly newer than
//! the local modification stamp; anything else is discarded.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use slotline_core::keys;
use slotline_core::modified::{local_last_modified, set_local_modified};
use slotline_core::store::SharedStore;
use slotline_protocol::prelude::SyncSnapshot;
use tracing::{debug, info, warn};

use crate::backend::RemoteBackend;
use crate::error::{Result, SyncError};

/// Default id of the mirrored row.
pub const DEFAULT_ROW_ID: &str = "sole-user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SyncStatus {
    Off,
    /// Configured, but no round trip has completed yet.
    Idle,
    Connected,
    Syncing,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    /// The remote snapshot replaced local state.
    Applied { remote: DateTime<Utc> },
    /// The remote snapshot was not newer than local state and was discarded.
    Stale {
        remote: DateTime<Utc>,
        local: Option<DateTime<Utc>>,
    },
    /// Nothing has been pushed yet.
    Empty,
}

#[derive(Debug)]
struct SyncState {
    status: SyncStatus,
    last_sync: Option<DateTime<Utc>>,
}

pub struct SyncCoordinator {
    store: SharedStore,
    backend: Option<Arc<dyn RemoteBackend>>,
    row_id: String,
    state: RwLock<SyncState>,
}

impl SyncCoordinator {
    pub fn new(store: SharedStore, backend: Arc<dyn RemoteBackend>, row_id: impl Into<String>) -> Self {
        Self {
            store,
            backend: Some(backend),
            row_id: row_id.into(),
            state: RwLock::new(SyncState {
                status: SyncStatus::Idle,
                last_sync: None,
            }),
        }
    }

    /// A coordinator with no remote; every sync call fails with [`SyncError::Disabled`].
    pub fn disabled(store: SharedStore) -> Self {
        Self {
            store,
            backend: None,
            row_id: DEFAULT_ROW_ID.to_string(),
            state: RwLock::new(SyncState {
                status: SyncStatus::Off,
                last_sync: None,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn status(&self) -> SyncStatus {
        self.state.read().status.clone()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_sync
    }

    /// Copies every syncable key of the local store. Mirror credentials are left out.
    pub fn snapshot(&self, now: DateTime<Utc>) -> SyncSnapshot {
        let store = self.store.as_ref();
        let payload: BTreeMap<String, Value> = store
            .keys()
            .into_iter()
            .filter(|key| keys::is_syncable(key))
            .filter_map(|key| store.get(&key).map(|value| (key, value)))
            .collect();
        SyncSnapshot::new(payload, now)
    }

    pub async fn push(&self, now: DateTime<Utc>) -> Result<SyncSnapshot> {
        let backend = self.backend()?;
        self.set_status(SyncStatus::Syncing);

        let snapshot = self.snapshot(now);
        if let Err(err) = backend.upsert(&self.row_id, &snapshot).await {
            return Err(self.fail(err));
        }

        // our own upload must not come back as a newer remote snapshot
        let local = local_last_modified(self.store.as_ref());
        if local.map_or(true, |local| local < snapshot.updated_at) {
            set_local_modified(self.store.as_ref(), snapshot.updated_at)?;
        }

        self.succeed(now);
        info!(row = %self.row_id, keys = snapshot.payload.len(), "snapshot pushed");
        Ok(snapshot)
    }

    pub async fn pull(&self, now: DateTime<Utc>) -> Result<PullOutcome> {
        let backend = self.backend()?;
        self.set_status(SyncStatus::Syncing);

        let remote = match backend.fetch(&self.row_id).await {
            Ok(remote) => remote,
            Err(err) => return Err(self.fail(err)),
        };

        let outcome = match remote {
            None => PullOutcome::Empty,
            Some(remote) => {
                let local = local_last_modified(self.store.as_ref());
                let newer = local.map_or(true, |local| remote.is_newer_than(local));
                if newer {
                    let stamp = remote.updated_at;
                    self.apply(remote)?;
                    PullOutcome::Applied { remote: stamp }
                } else {
                    debug!(remote = %remote.updated_at, ?local, "remote snapshot not newer; discarded");
                    PullOutcome::Stale {
                        remote: remote.updated_at,
                        local,
                    }
                }
            }
        };

        self.succeed(now);
        Ok(outcome)
    }

    /// Replaces every syncable local key with the snapshot's contents.
    pub fn apply(&self, snapshot: SyncSnapshot) -> Result<()> {
        let store = self.store.as_ref();
        for key in store.keys() {
            if keys::is_syncable(&key) && !snapshot.payload.contains_key(&key) {
                store.remove(&key)?;
            }
        }
        for (key, value) in &snapshot.payload {
            if keys::is_syncable(key) {
                store.set(key, value.clone())?;
            }
        }
        set_local_modified(store, snapshot.updated_at)?;
        info!(remote = %snapshot.updated_at, keys = snapshot.payload.len(), "remote snapshot applied");
        Ok(())
    }

    fn backend(&self) -> Result<&Arc<dyn RemoteBackend>> {
        self.backend.as_ref().ok_or(SyncError::Disabled)
    }

    fn set_status(&self, status: SyncStatus) {
        self.state.write().status = status;
    }

    fn succeed(&self, now: DateTime<Utc>) {
        let mut state = self.state.write();
        state.status = SyncStatus::Connected;
        state.last_sync = Some(now);
    }

    fn fail(&self, err: SyncError) -> SyncError {
        warn!(row = %self.row_id, %err, "sync failed");
        self.set_status(SyncStatus::Error(err.to_string()));
        err
    }
}
