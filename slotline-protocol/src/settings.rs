use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Slots alarmed when nothing has been configured: the RED tier.
pub const DEFAULT_ALARM_SLOTS: [u8; 3] = [15, 16, 17];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Operator preferences. Each field lives under its own store key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub theme: Theme,
    pub enabled_alarms: BTreeSet<u8>,
    pub notifications: bool,
    pub bridge_url: Option<String>,
    pub bridge_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            enabled_alarms: DEFAULT_ALARM_SLOTS.into_iter().collect(),
            notifications: false,
            bridge_url: None,
            bridge_key: None,
        }
    }
}

impl Settings {
    /// Both halves of the mirror credential are present and non-empty.
    pub fn has_bridge(&self) -> bool {
        matches!(
            (self.bridge_url.as_deref(), self.bridge_key.as_deref()),
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty()
        )
    }
}
