//! Core shared library for the Slotline tracker.
//!
//! This crate exposes the primitives the other Slotline crates depend on:
//! the canonical error type, configuration loading, logging setup, JSON
//! helpers and the local key-value store with its key namespace.

pub mod config;
pub mod errors;
pub mod keys;
pub mod logging;
pub mod modified;
pub mod serde_utils;
pub mod store;

pub use config::{Environment, SlotlineConfig, SyncEndpoint};
pub use errors::{ConfigError, Result as CoreResult, SlotlineError};
pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore};
