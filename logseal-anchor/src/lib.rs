//! Logseal Anchor - clients for the append-only anchor ledger.
//!
//! The ledger records one Merkle root per batch and assigns batch ids,
//! starting at zero. This crate provides the [`AnchorClient`] trait and
//! two implementations:
//!
//! - [`MemoryAnchor`] - in-process ledger with fault injection, used in
//!   tests and local development
//! - [`HttpAnchor`] - client for a ledger service over JSON/HTTP
//!
//! plus [`retry`] helpers that retry transient failures with backoff.

pub mod client;
pub mod errors;
pub mod http;
pub mod memory;
pub mod retry;

pub use client::{AnchorClient, AnchoredRoot};
pub use errors::{AnchorError, Result};
pub use http::{HttpAnchor, HttpAnchorConfig};
pub use memory::{MemoryAnchor, MemoryAnchorConfig};
pub use retry::{with_retry, RetryPolicy};
