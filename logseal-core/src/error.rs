//! Error types shared across the Logseal crates.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core types and the Merkle engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A log record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A timestamp is not valid RFC 3339.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A hash string could not be decoded.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// A log level string is not one of the known levels.
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// The Merkle engine was given no records.
    #[error("cannot build a batch from zero records")]
    EmptyBatch,

    /// Batch artifacts violate an invariant.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}

impl Error {
    /// Invalid record error with context.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Error::InvalidRecord(msg.into())
    }

    /// Invalid timestamp error with context.
    pub fn invalid_timestamp(msg: impl Into<String>) -> Self {
        Error::InvalidTimestamp(msg.into())
    }

    /// Invalid hash error with context.
    pub fn invalid_hash(msg: impl Into<String>) -> Self {
        Error::InvalidHash(msg.into())
    }

    /// Invalid batch error with context.
    pub fn invalid_batch(msg: impl Into<String>) -> Self {
        Error::InvalidBatch(msg.into())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHash(e.to_string())
    }
}
