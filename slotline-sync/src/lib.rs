//! Slotline sync - mirrors the local store to a single remote row.

pub mod backend;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod memory;
pub mod realtime;
pub mod rest;

use std::sync::Arc;

use slotline_core::{SharedStore, SlotlineConfig, SyncEndpoint};
use slotline_protocol::prelude::Settings;

pub use backend::RemoteBackend;
pub use coordinator::{PullOutcome, SyncCoordinator, SyncStatus, DEFAULT_ROW_ID};
pub use driver::{SyncDriver, SyncTrigger};
pub use error::SyncError;
pub use memory::MemoryBackend;
pub use realtime::{realtime_url_for, RealtimeListener};
pub use rest::RestBackend;

/// Endpoint to mirror to: credentials stored in settings win over the environment.
///
/// The realtime address comes from the environment when set, otherwise it is
/// derived from the REST endpoint and key.
pub fn resolve_endpoint(config: &SlotlineConfig, settings: &Settings) -> Option<SyncEndpoint> {
    let (url, key) = match (&settings.bridge_url, &settings.bridge_key) {
        (Some(url), Some(key)) if settings.has_bridge() => {
            (url.trim().to_string(), key.trim().to_string())
        }
        _ => {
            let endpoint = config.sync_endpoint.as_ref()?;
            (endpoint.url.clone(), endpoint.key.clone())
        }
    };
    let realtime_url = config
        .sync_endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.realtime_url.clone())
        .or_else(|| realtime_url_for(&url, &key).ok().map(String::from));
    Some(SyncEndpoint {
        url,
        key,
        realtime_url,
    })
}

/// Builds a REST-backed coordinator, or a disabled one when no endpoint is known.
pub fn build_coordinator(
    store: SharedStore,
    config: &SlotlineConfig,
    settings: &Settings,
) -> error::Result<SyncCoordinator> {
    match resolve_endpoint(config, settings) {
        Some(endpoint) => {
            let backend = RestBackend::new(&endpoint.url, &endpoint.key)?;
            Ok(SyncCoordinator::new(
                store,
                Arc::new(backend),
                config.sync_row_id.clone(),
            ))
        }
        None => Ok(SyncCoordinator::disabled(store)),
    }
}
