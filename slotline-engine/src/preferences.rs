use std::collections::BTreeSet;

use slotline_core::keys;
use slotline_core::store::{load, load_or_default, save, KeyValueStore};
use slotline_protocol::prelude::{Settings, DEFAULT_ALARM_SLOTS, SLOT_COUNT};

use crate::error::{EngineError, Result};

/// Reads every settings key, defaulting each one independently.
pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    Settings {
        theme: load_or_default(store, keys::THEME),
        enabled_alarms: load::<BTreeSet<u8>>(store, keys::ENABLED_ALARMS)
            .unwrap_or_else(|| DEFAULT_ALARM_SLOTS.into_iter().collect()),
        notifications: load_or_default(store, keys::NOTIFICATIONS),
        bridge_url: load(store, keys::BRIDGE_URL),
        bridge_key: load(store, keys::BRIDGE_KEY),
    }
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<()> {
    validate_alarms(&settings.enabled_alarms)?;
    save(store, keys::THEME, &settings.theme)?;
    save(store, keys::ENABLED_ALARMS, &settings.enabled_alarms)?;
    save(store, keys::NOTIFICATIONS, &settings.notifications)?;
    match (&settings.bridge_url, &settings.bridge_key) {
        (Some(url), Some(key)) => {
            save(store, keys::BRIDGE_URL, url)?;
            save(store, keys::BRIDGE_KEY, key)?;
        }
        _ => {
            store.remove(keys::BRIDGE_URL)?;
            store.remove(keys::BRIDGE_KEY)?;
        }
    }
    Ok(())
}

pub fn validate_alarms(slots: &BTreeSet<u8>) -> Result<()> {
    match slots.iter().find(|slot| !(1..=SLOT_COUNT).contains(*slot)) {
        Some(&slot) => Err(EngineError::InvalidSlot(slot)),
        None => Ok(()),
    }
}
