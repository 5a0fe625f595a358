//! The batch aggregation cycle.
//!
//! Each cycle walks a fixed sequence whose ordering carries the
//! durability guarantee:
//!
//! 1. drain the intake spool (a read-only snapshot);
//! 2. seal records with batch-local ids in drain order;
//! 3. build the Merkle tree;
//! 4. commit the root to the anchor ledger, with timeout and retry;
//! 5. archive metadata, records, and proofs atomically;
//! 6. consume the drained spool files.
//!
//! Records leave the spool only in step 6, after the batch is fully
//! anchored and archived. A crash or failure earlier re-presents the
//! same records next cycle; the cost is a possible duplicate batch,
//! never a lost record.

use std::sync::Arc;
use std::time::Duration;

use logseal_anchor::{with_retry, AnchorClient, AnchorError, RetryPolicy};
use logseal_core::batch::Batch;
use logseal_core::crypto::Hash;
use logseal_core::merkle;
use logseal_core::record::SealedRecord;
use logseal_store::{BatchArchive, IntakeQueue, StoreError};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors raised by a batch cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("anchor commit failed: {0}")]
    Anchor(#[from] AnchorError),

    #[error(transparent)]
    Core(#[from] logseal_core::Error),
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The spool was empty; nothing was committed and the anchor was
    /// not contacted.
    NoOp,
    /// A batch was anchored and archived.
    Committed { batch_id: u64, record_count: usize },
}

/// Aggregator tuning.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Time between scheduled cycles.
    pub cycle_interval: Duration,
    /// Retries after a failed commit attempt (0 = one attempt only).
    pub commit_retries: u32,
    /// Backoff before the first commit retry; doubles per retry.
    pub retry_base_delay: Duration,
    /// Deadline for each individual commit attempt.
    pub anchor_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60),
            commit_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            anchor_timeout: Duration::from_secs(10),
        }
    }
}

/// Drives intake records through anchoring into the archive.
pub struct BatchAggregator {
    intake: IntakeQueue,
    archive: BatchArchive,
    anchor: Arc<dyn AnchorClient>,
    config: AggregatorConfig,
    // Serializes overlapping cycle triggers (timer vs. manual).
    cycle_lock: Mutex<()>,
}

impl BatchAggregator {
    pub fn new(
        intake: IntakeQueue,
        archive: BatchArchive,
        anchor: Arc<dyn AnchorClient>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            intake,
            archive,
            anchor,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn intake(&self) -> &IntakeQueue {
        &self.intake
    }

    pub fn archive(&self) -> &BatchArchive {
        &self.archive
    }

    /// Run one batch cycle.
    ///
    /// Returns [`CycleOutcome::NoOp`] without touching the anchor when
    /// the spool is empty. On any error the spool is left untouched.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let _guard = self.cycle_lock.lock().await;

        let (records, receipt) = self.intake.drain()?;
        if records.is_empty() {
            debug!("intake spool empty, skipping cycle");
            return Ok(CycleOutcome::NoOp);
        }

        let sealed = SealedRecord::seal_all(records);
        let built = merkle::build(&sealed)?;

        let batch_id = self.commit_with_retry(built.root).await?;

        let batch = Batch::from_records(batch_id, built.root, &sealed)?;
        self.archive.write(&batch, &sealed, &built.proofs)?;

        // Spool files go away only after the batch is fully published.
        self.intake.consume(receipt)?;

        info!(
            batch_id,
            record_count = sealed.len(),
            merkle_root = %built.root,
            "batch committed"
        );
        Ok(CycleOutcome::Committed {
            batch_id,
            record_count: sealed.len(),
        })
    }

    async fn commit_with_retry(&self, root: Hash) -> Result<u64, AnchorError> {
        let policy = RetryPolicy {
            max_attempts: self.config.commit_retries + 1,
            base_delay: self.config.retry_base_delay,
        };
        let deadline = self.config.anchor_timeout;
        let anchor = Arc::clone(&self.anchor);

        with_retry(&policy, move || {
            let anchor = Arc::clone(&anchor);
            async move {
                match tokio::time::timeout(deadline, anchor.commit(&root)).await {
                    Ok(result) => result,
                    Err(_) => Err(AnchorError::Timeout(deadline.as_millis() as u64)),
                }
            }
        })
        .await
    }

    /// Run cycles on the configured interval until `shutdown` fires.
    ///
    /// A failed cycle is logged and the loop continues; the spooled
    /// records are still there for the next tick.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(CycleOutcome::NoOp) => {}
                        Ok(CycleOutcome::Committed { batch_id, record_count }) => {
                            debug!(batch_id, record_count, "cycle committed batch");
                        }
                        Err(e) => {
                            warn!(error = %e, "batch cycle failed, spool retained");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("aggregator stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logseal_anchor::{MemoryAnchor, MemoryAnchorConfig};
    use logseal_core::record::{LogLevel, LogRecord};

    fn record(minute: u32, message: &str) -> LogRecord {
        LogRecord::new(
            format!("2025-03-31T10:{minute:02}:00Z"),
            LogLevel::Info,
            message,
            "aggregator-test",
        )
        .unwrap()
    }

    fn aggregator(anchor: Arc<MemoryAnchor>) -> BatchAggregator {
        let config = AggregatorConfig {
            commit_retries: 0,
            retry_base_delay: Duration::from_millis(1),
            ..AggregatorConfig::default()
        };
        BatchAggregator::new(
            IntakeQueue::open_temp().unwrap(),
            BatchArchive::open_temp().unwrap(),
            anchor,
            config,
        )
    }

    #[tokio::test]
    async fn test_empty_spool_is_noop() {
        let anchor = Arc::new(MemoryAnchor::new());
        let agg = aggregator(Arc::clone(&anchor));

        assert_eq!(agg.run_cycle().await.unwrap(), CycleOutcome::NoOp);
        // An empty cycle must not contact the ledger.
        assert!(anchor.is_empty());
    }

    #[tokio::test]
    async fn test_first_batch_gets_id_zero() {
        let anchor = Arc::new(MemoryAnchor::new());
        let agg = aggregator(Arc::clone(&anchor));

        agg.intake().append(&record(0, "first")).unwrap();
        agg.intake().append(&record(1, "second")).unwrap();

        let outcome = agg.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Committed {
                batch_id: 0,
                record_count: 2
            }
        );

        let batch = agg.archive().read_metadata(0).unwrap().unwrap();
        assert_eq!(batch.record_count, 2);
        assert_eq!(batch.time_range.start, "2025-03-31T10:00:00Z");
        assert_eq!(batch.time_range.end, "2025-03-31T10:01:00Z");

        // Anchored root matches the archived metadata.
        let anchored = anchor.retrieve(0).await.unwrap();
        assert_eq!(anchored.parse_root(), Some(batch.merkle_root));

        // Ids follow drain order.
        let records = agg.archive().read_records(0).unwrap().unwrap();
        assert_eq!(records[0].id.as_str(), "log_1");
        assert_eq!(records[0].record.message, "first");
        assert_eq!(records[1].id.as_str(), "log_2");

        assert!(agg.intake().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_cycles_produce_sequential_batches() {
        let anchor = Arc::new(MemoryAnchor::new());
        let agg = aggregator(anchor);

        agg.intake().append(&record(0, "a")).unwrap();
        agg.run_cycle().await.unwrap();

        agg.intake().append(&record(1, "b")).unwrap();
        let outcome = agg.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Committed {
                batch_id: 1,
                record_count: 1
            }
        );
        assert_eq!(agg.archive().list_batches().unwrap(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_anchor_failure_keeps_spool() {
        let anchor = Arc::new(MemoryAnchor::new());
        anchor.set_available(false);
        let agg = aggregator(Arc::clone(&anchor));

        agg.intake().append(&record(0, "kept")).unwrap();

        let err = agg.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Anchor(_)));
        // Nothing published, nothing consumed.
        assert!(agg.archive().list_batches().unwrap().is_empty());
        assert_eq!(agg.intake().pending_files().unwrap(), 1);

        // The same records commit once the ledger recovers.
        anchor.set_available(true);
        let outcome = agg.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Committed {
                batch_id: 0,
                record_count: 1
            }
        );
        assert!(agg.intake().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_transient_faults_retried() {
        let anchor = Arc::new(MemoryAnchor::with_config(MemoryAnchorConfig {
            failure_rate: 0.5,
            ..MemoryAnchorConfig::default()
        }));
        let config = AggregatorConfig {
            commit_retries: 50,
            retry_base_delay: Duration::from_millis(1),
            ..AggregatorConfig::default()
        };
        let agg = BatchAggregator::new(
            IntakeQueue::open_temp().unwrap(),
            BatchArchive::open_temp().unwrap(),
            anchor,
            config,
        );

        agg.intake().append(&record(0, "eventually")).unwrap();
        // 51 attempts at 50% loss; failure odds are negligible.
        let outcome = agg.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Committed { .. }));
    }

    #[tokio::test]
    async fn test_run_loop_commits_and_stops() {
        let anchor = Arc::new(MemoryAnchor::new());
        let config = AggregatorConfig {
            cycle_interval: Duration::from_millis(10),
            commit_retries: 0,
            ..AggregatorConfig::default()
        };
        let agg = Arc::new(BatchAggregator::new(
            IntakeQueue::open_temp().unwrap(),
            BatchArchive::open_temp().unwrap(),
            anchor,
            config,
        ));
        agg.intake().append(&record(0, "looped")).unwrap();

        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn({
            let agg = Arc::clone(&agg);
            async move { agg.run(rx).await }
        });

        for _ in 0..200 {
            if agg.archive().contains(0) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(()).await.unwrap();
        handle.await.unwrap();

        assert!(agg.archive().contains(0));
        assert!(agg.intake().is_empty().unwrap());
    }
}
