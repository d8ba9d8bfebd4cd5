use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full copy of the persisted namespace with the instant it was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSnapshot {
    pub payload: BTreeMap<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl SyncSnapshot {
    pub fn new(payload: BTreeMap<String, Value>, updated_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            updated_at,
        }
    }

    pub fn is_newer_than(&self, instant: DateTime<Utc>) -> bool {
        self.updated_at > instant
    }

    /// Last-write-wins: the snapshot with the later timestamp, independent of argument order.
    ///
    /// Equal timestamps keep `self`.
    pub fn merge(self, other: SyncSnapshot) -> SyncSnapshot {
        if other.updated_at > self.updated_at {
            other
        } else {
            self
        }
    }
}
