//! Slotline: slot-anchored daily revenue tracking
//!
//! The business day is split into 18 fixed slots anchored at 09:00 UTC+01:00.
//! Revenue observations are checkpointed per slot, projected to a day total and
//! reconciled into history once the day closes.
//!
//! # Architecture
//!
//! * `core`: configuration, errors, logging and the key-value store
//! * `protocol`: shared data types (days, records, schedule, settings, snapshots)
//! * `engine`: slot mapping, ledger, projections, day cycle and the tick loop
//! * `sync`: snapshot mirroring to a remote row with last-write-wins

pub use slotline_core as core;
pub use slotline_engine as engine;
pub use slotline_protocol as protocol;
pub use slotline_sync as sync;

pub use slotline_core::{SlotlineConfig, SlotlineError};
pub use slotline_engine::{DashboardView, TickRuntime, Tracker};
pub use slotline_sync::{SyncCoordinator, SyncDriver};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
