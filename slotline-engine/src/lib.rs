//! Slotline engine - slot clock, checkpoint ledger, projections and the day cycle.

pub mod alerts;
pub mod archive;
pub mod clock;
pub mod day_cycle;
pub mod error;
pub mod input;
pub mod ledger;
pub mod preferences;
pub mod projection;
pub mod runtime;
pub mod tracker;

pub use alerts::{AlertKind, SlotAlert};
pub use clock::{format_countdown, parse_time_override, DayAnchor};
pub use day_cycle::{CycleState, DayCycleController, DayTransition};
pub use error::EngineError;
pub use input::{time_ago, ValidationNotice};
pub use ledger::Ledger;
pub use projection::{project, Confidence, Projection};
pub use runtime::TickRuntime;
pub use tracker::{DashboardView, RevenueUpdate, SharedTracker, TickEvent, Tracker};
