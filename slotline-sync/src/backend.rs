use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotline_protocol::prelude::SyncSnapshot;
use tokio::sync::broadcast;

use crate::error::Result;

/// A single logical row on the remote side, addressed by a fixed id.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Inserts or replaces the row with `snapshot`.
    async fn upsert(&self, row_id: &str, snapshot: &SyncSnapshot) -> Result<()>;

    /// Reads the row, `None` when it was never written.
    async fn fetch(&self, row_id: &str) -> Result<Option<SyncSnapshot>>;

    /// Change notifications carrying the new row timestamp, when the backend offers them in-process.
    fn subscribe(&self) -> Option<broadcast::Receiver<DateTime<Utc>>> {
        None
    }
}
