//! Logseal Core - fundamental types for the Logseal log-integrity system.
//!
//! This crate provides the pure (no I/O) building blocks shared by the
//! rest of the workspace:
//!
//! - [`crypto`] - Keccak-256 hashing and sorted-pair combination
//! - [`record`] - log records, canonical encoding, sealed records
//! - [`merkle`] - batch tree construction and proof verification
//! - [`batch`] - committed-batch metadata and invariant checks
//! - [`proof`] - per-record inclusion proofs
//!
//! # Example
//!
//! ```rust
//! use logseal_core::{
//!     merkle,
//!     record::{LogLevel, LogRecord, SealedRecord},
//! };
//!
//! let records = SealedRecord::seal_all(vec![
//!     LogRecord::new(
//!         "2025-03-31T10:00:00Z",
//!         LogLevel::Info,
//!         "User alice logged in successfully",
//!         "auth-service",
//!     )
//!     .unwrap(),
//!     LogRecord::new(
//!         "2025-03-31T10:01:00Z",
//!         LogLevel::Warn,
//!         "High memory usage detected: 85%",
//!         "monitor-service",
//!     )
//!     .unwrap(),
//! ]);
//!
//! let built = merkle::build(&records).unwrap();
//! let proof = &built.proofs[&records[0].id];
//! assert!(merkle::verify_proof(proof.leaf_hash, &proof.siblings, built.root));
//! ```

pub mod batch;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod proof;
pub mod record;

#[cfg(test)]
mod proptest;

// Re-exports for convenience
pub use batch::{Batch, TimeRange};
pub use crypto::{hash_pair, keccak256, Hash};
pub use error::{Error, Result};
pub use merkle::{build, verify_proof, MerkleBatch};
pub use proof::ProofEntry;
pub use record::{
    FieldDiff, LogLevel, LogRecord, RecordId, SealedRecord, MAX_MESSAGE_LEN, MAX_SOURCE_LEN,
};
