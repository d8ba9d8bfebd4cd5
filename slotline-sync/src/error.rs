use slotline_core::SlotlineError;
use slotline_engine::EngineError;
use thiserror::Error;

/// Errors raised while mirroring state to the remote row.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync is not configured")]
    Disabled,
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("realtime channel error: {0}")]
    Realtime(String),
    #[error(transparent)]
    Store(#[from] SlotlineError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
