//! Logseal Store - durable spool and archive for the Logseal system.
//!
//! Two components, both filesystem-backed:
//!
//! - [`intake`] - the append-only spool of records awaiting batching,
//!   with a snapshot/consume protocol that keeps records safe until
//!   their batch is fully published
//! - [`archive`] - the immutable per-batch artifact store (metadata,
//!   record list, proof table) with atomic publish

pub mod archive;
pub mod intake;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the intake spool and batch archive.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("batch {0} already archived")]
    BatchExists(u64),

    #[error(transparent)]
    Core(#[from] logseal_core::Error),
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub use archive::BatchArchive;
pub use intake::{DrainReceipt, IntakeQueue};
