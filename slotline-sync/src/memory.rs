use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use slotline_protocol::prelude::SyncSnapshot;
use tokio::sync::broadcast;

use crate::backend::RemoteBackend;
use crate::error::Result;

/// In-process backend used by tests and offline demos.
pub struct MemoryBackend {
    rows: RwLock<HashMap<String, SyncSnapshot>>,
    changes: broadcast::Sender<DateTime<Utc>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            rows: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, row_id: &str) -> Option<SyncSnapshot> {
        self.rows.read().get(row_id).cloned()
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn upsert(&self, row_id: &str, snapshot: &SyncSnapshot) -> Result<()> {
        self.rows
            .write()
            .insert(row_id.to_string(), snapshot.clone());
        // no subscribers is fine
        let _ = self.changes.send(snapshot.updated_at);
        Ok(())
    }

    async fn fetch(&self, row_id: &str) -> Result<Option<SyncSnapshot>> {
        Ok(self.row(row_id))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DateTime<Utc>>> {
        Some(self.changes.subscribe())
    }
}
