//! In-memory anchor ledger.
//!
//! Behaves like the real ledger from the caller's side: sequential batch
//! ids starting at zero, immutable roots, and configurable latency and
//! fault injection for exercising retry and failure paths in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use logseal_core::crypto::Hash;
use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

use crate::client::{AnchorClient, AnchoredRoot};
use crate::errors::{AnchorError, Result};

/// Tuning knobs for the in-memory ledger.
#[derive(Debug, Clone)]
pub struct MemoryAnchorConfig {
    /// Id assigned to the first commit. The real ledger starts at `0`.
    pub first_id: u64,
    /// Artificial delay applied to every operation.
    pub latency: Option<Duration>,
    /// Probability in `[0.0, 1.0]` that an operation fails with a
    /// network error.
    pub failure_rate: f64,
}

impl Default for MemoryAnchorConfig {
    fn default() -> Self {
        Self {
            first_id: 0,
            latency: None,
            failure_rate: 0.0,
        }
    }
}

/// In-memory [`AnchorClient`] implementation.
#[derive(Debug)]
pub struct MemoryAnchor {
    config: MemoryAnchorConfig,
    next_id: AtomicU64,
    available: AtomicBool,
    roots: RwLock<HashMap<u64, AnchoredRoot>>,
}

impl MemoryAnchor {
    pub fn new() -> Self {
        Self::with_config(MemoryAnchorConfig::default())
    }

    pub fn with_config(config: MemoryAnchorConfig) -> Self {
        Self {
            next_id: AtomicU64::new(config.first_id),
            available: AtomicBool::new(true),
            roots: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Toggle availability; unavailable operations fail retryably.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Store an arbitrary string under `batch_id`, bypassing commit.
    ///
    /// Lets tests model a corrupted or malformed ledger entry.
    pub fn set_raw_root(&self, batch_id: u64, root: impl Into<String>) {
        self.roots.write().insert(
            batch_id,
            AnchoredRoot {
                root: root.into(),
                anchored_at: Utc::now(),
            },
        );
    }

    /// Id of the most recent commit, if any commit has happened.
    pub fn latest_id(&self) -> Option<u64> {
        let next = self.next_id.load(Ordering::SeqCst);
        (next > self.config.first_id).then(|| next - 1)
    }

    /// Number of anchored roots.
    pub fn len(&self) -> usize {
        self.roots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.read().is_empty()
    }

    async fn simulate(&self) -> Result<()> {
        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }
        if self.config.failure_rate > 0.0 {
            let roll: f64 = rand::thread_rng().gen();
            if roll < self.config.failure_rate {
                return Err(AnchorError::Network("injected fault".to_string()));
            }
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(AnchorError::Unavailable("ledger offline".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryAnchor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnchorClient for MemoryAnchor {
    async fn commit(&self, root: &Hash) -> Result<u64> {
        self.simulate().await?;

        let batch_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.roots.write().insert(
            batch_id,
            AnchoredRoot {
                root: root.to_hex(),
                anchored_at: Utc::now(),
            },
        );
        debug!(batch_id, root = %root, "anchored root");
        Ok(batch_id)
    }

    async fn retrieve(&self, batch_id: u64) -> Result<AnchoredRoot> {
        self.simulate().await?;

        self.roots
            .read()
            .get(&batch_id)
            .cloned()
            .ok_or(AnchorError::NotFound(batch_id))
    }
}
