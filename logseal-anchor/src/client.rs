//! The anchor client abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logseal_core::crypto::Hash;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A root as recorded by the anchor ledger.
///
/// The root is kept as the raw string the ledger returned rather than a
/// parsed [`Hash`]: verification must be able to observe and classify a
/// malformed ledger entry instead of failing to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredRoot {
    /// Hex-encoded root, `0x`-prefixed, as stored by the ledger.
    pub root: String,
    /// When the root was anchored.
    pub anchored_at: DateTime<Utc>,
}

impl AnchoredRoot {
    /// Decode the anchored root, if it is a well-formed 32-byte hex hash.
    pub fn parse_root(&self) -> Option<Hash> {
        Hash::from_hex(&self.root).ok()
    }
}

/// Client for an append-only anchor ledger.
///
/// The ledger assigns batch ids; `0` is the first valid id, not a
/// sentinel. A committed root is immutable and retrievable forever.
#[async_trait]
pub trait AnchorClient: Send + Sync {
    /// Commit a Merkle root, returning the ledger-assigned batch id.
    async fn commit(&self, root: &Hash) -> Result<u64>;

    /// Retrieve the root anchored under `batch_id`.
    async fn retrieve(&self, batch_id: u64) -> Result<AnchoredRoot>;
}
