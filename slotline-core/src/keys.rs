//! Namespaced keys of the local store.

use std::fmt::Display;

pub const HISTORY: &str = "history";
pub const PENDING_RECONCILIATION: &str = "pending_reconciliation";
pub const LAST_DAY_KEY: &str = "last_day_key";
pub const LOCAL_LAST_MODIFIED: &str = "local_last_modified";
pub const ALERT_DISMISSED: &str = "alert_dismissed";

pub const THEME: &str = "settings:theme";
pub const ENABLED_ALARMS: &str = "settings:alarms";
pub const NOTIFICATIONS: &str = "settings:notifications";
pub const BRIDGE_URL: &str = "settings:bridge_url";
pub const BRIDGE_KEY: &str = "settings:bridge_key";

/// Running total and goal for one business day.
pub fn daily(day: impl Display) -> String {
    format!("daily:{day}")
}

/// Posted-slot set for one business day.
pub fn posted(day: impl Display) -> String {
    format!("posted:{day}")
}

/// Checkpoint ledger for one business day.
pub fn checkpoints(day: impl Display) -> String {
    format!("checkpoints:{day}")
}

/// Whether a key may leave the device in a sync payload. Mirror credentials never do.
pub fn is_syncable(key: &str) -> bool {
    !key.contains("bridge")
}
