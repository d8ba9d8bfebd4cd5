use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{DailyRecord, HistoryMap};

/// Tag every backup document carries; imports with another tag are rejected.
pub const BACKUP_APP_TAG: &str = "Slotline";

/// Portable copy of the history map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub app: String,
    pub export_date: DateTime<Utc>,
    /// Flattened entries sorted by date, for human readers and spreadsheets.
    pub history: Vec<DailyRecord>,
    /// The history map exactly as stored; the only part read back on import.
    pub raw: Option<HistoryMap>,
}

impl BackupDocument {
    pub fn new(history: &HistoryMap, export_date: DateTime<Utc>) -> Self {
        Self {
            app: BACKUP_APP_TAG.to_string(),
            export_date,
            history: history.values().cloned().collect(),
            raw: Some(history.clone()),
        }
    }
}
