use slotline_core::SlotlineError;
use slotline_protocol::prelude::DayKey;
use thiserror::Error;

/// Errors raised by the tracker engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] SlotlineError),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("slot {0} is outside 1..=18")]
    InvalidSlot(u8),
    #[error("no day is awaiting reconciliation")]
    NothingToReconcile,
    #[error("no history record for {0}")]
    RecordNotFound(DayKey),
    #[error("backup rejected: {0}")]
    BackupRejected(String),
    #[error("runtime is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, EngineError>;
