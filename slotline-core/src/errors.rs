use std::io;

use thiserror::Error;

/// Result type used across the Slotline core crate.
pub type Result<T> = std::result::Result<T, SlotlineError>;

/// Canonical error representation shared by all Slotline crates.
#[derive(Debug, Error)]
pub enum SlotlineError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("general error: {0}")]
    GeneralError(String),
}

impl From<serde_json::Error> for SlotlineError {
    fn from(err: serde_json::Error) -> Self {
        SlotlineError::DeserializationError(err.to_string())
    }
}

impl From<anyhow::Error> for SlotlineError {
    fn from(err: anyhow::Error) -> Self {
        SlotlineError::GeneralError(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable missing: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("no data directory available on this platform")]
    NoDataDir,
}

impl From<ConfigError> for SlotlineError {
    fn from(value: ConfigError) -> Self {
        SlotlineError::ConfigError(value.to_string())
    }
}
