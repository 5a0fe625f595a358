//! The verification pipeline.
//!
//! A single pass over one candidate record:
//!
//! 1. locate the record in the archive (hinted batch or newest-first
//!    scan, with an optional fuzzy fallback);
//! 2. compare the candidate field-wise against the located record;
//! 3. compare the candidate's leaf hash against the archived proof;
//! 4. retrieve the anchored root for the batch;
//! 5. recompute the proof against that root.
//!
//! The pipeline is read-only and classifies every failure rather than
//! propagating it: an archive or ledger fault says nothing about the
//! data and must never masquerade as a missing or tampered record.

use std::sync::Arc;
use std::time::Duration;

use logseal_anchor::{AnchorClient, AnchorError};
use logseal_core::merkle;
use logseal_core::record::{LogRecord, SealedRecord};
use logseal_store::BatchArchive;
use tracing::debug;

use crate::outcome::{VerificationResult, VerifyOutcome};

/// How the locator matches candidates against archived records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Only a field-exact record counts as located.
    #[default]
    Exact,
    /// Exact first; failing that, fall back to records sharing the
    /// candidate's timestamp, ranked by numeric tokens shared with the
    /// candidate's message. Surfaces near-misses as content mismatches
    /// instead of absences.
    ExactThenFuzzy,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for the anchor retrieve.
    pub anchor_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anchor_timeout: Duration::from_secs(10),
        }
    }
}

/// Verifies candidate records against the archive and the anchor ledger.
pub struct VerificationEngine {
    archive: BatchArchive,
    anchor: Arc<dyn AnchorClient>,
    config: EngineConfig,
}

impl VerificationEngine {
    pub fn new(archive: BatchArchive, anchor: Arc<dyn AnchorClient>, config: EngineConfig) -> Self {
        Self {
            archive,
            anchor,
            config,
        }
    }

    pub fn archive(&self) -> &BatchArchive {
        &self.archive
    }

    /// Verify one candidate record.
    ///
    /// Never fails: every condition, including archive and ledger
    /// trouble, is folded into the returned result's outcome.
    pub async fn verify(
        &self,
        candidate: &LogRecord,
        batch_hint: Option<u64>,
        mode: MatchMode,
    ) -> VerificationResult {
        let (batch_id, stored) = match self.locate(candidate, batch_hint, mode) {
            Ok(Some(located)) => located,
            Ok(None) => {
                return VerificationResult::new(VerifyOutcome::LogNotFound)
                    .with_detail("no archived record matches the candidate")
            }
            Err(detail) => {
                return VerificationResult::new(VerifyOutcome::VerificationError).with_detail(detail)
            }
        };
        debug!(batch_id, record_id = %stored.id, "candidate located");

        let mut result = VerificationResult::new(VerifyOutcome::Verified);
        result.batch_id = Some(batch_id);
        result.record_id = Some(stored.id.clone());

        // Field differences take precedence over every later check: a
        // near-miss with a passing proof is still a mismatch report.
        let discrepancies = candidate.diff(&stored.record);
        if !discrepancies.is_empty() {
            result.verified = false;
            result.outcome = VerifyOutcome::LogContentMismatch;
            result.detail = Some(format!(
                "candidate differs from archived record {} in {} field(s)",
                stored.id,
                discrepancies.len()
            ));
            result.discrepancies = discrepancies;
            return result;
        }

        let proof = match self.archive.read_proof(batch_id, &stored.id) {
            Ok(Some(proof)) => proof,
            Ok(None) => {
                return self.fail(
                    result,
                    VerifyOutcome::VerificationError,
                    format!("proof table of batch {batch_id} has no entry for {}", stored.id),
                )
            }
            Err(e) => {
                return self.fail(
                    result,
                    VerifyOutcome::VerificationError,
                    format!("reading proof table of batch {batch_id}: {e}"),
                )
            }
        };

        if candidate.leaf_hash() != proof.leaf_hash {
            return self.fail(
                result,
                VerifyOutcome::LogHashMismatch,
                format!("candidate hash differs from archived proof for {}", stored.id),
            );
        }

        let retrieve = tokio::time::timeout(
            self.config.anchor_timeout,
            self.anchor.retrieve(batch_id),
        )
        .await;
        let anchored = match retrieve {
            Ok(Ok(anchored)) => anchored,
            Ok(Err(AnchorError::NotFound(_))) => {
                return self.fail(
                    result,
                    VerifyOutcome::AnchorNotFound,
                    format!("ledger has no root for batch {batch_id}"),
                )
            }
            Ok(Err(e)) => {
                return self.fail(
                    result,
                    VerifyOutcome::VerificationError,
                    format!("anchor retrieve failed: {e}"),
                )
            }
            Err(_) => {
                return self.fail(
                    result,
                    VerifyOutcome::VerificationError,
                    format!(
                        "anchor retrieve timed out after {}ms",
                        self.config.anchor_timeout.as_millis()
                    ),
                )
            }
        };

        result.anchored_root = Some(anchored.root.clone());
        result.anchored_at = Some(anchored.anchored_at);

        let root = match anchored.parse_root() {
            Some(root) => root,
            None => {
                return self.fail(
                    result,
                    VerifyOutcome::InvalidMerkleRoot,
                    format!("anchored root for batch {batch_id} is not a 32-byte hash"),
                )
            }
        };

        if !merkle::verify_proof(proof.leaf_hash, &proof.siblings, root) {
            return self.fail(
                result,
                VerifyOutcome::MerkleProofInvalid,
                format!("proof for {} does not recompute to the anchored root", stored.id),
            );
        }

        result
    }

    fn fail(
        &self,
        mut result: VerificationResult,
        outcome: VerifyOutcome,
        detail: String,
    ) -> VerificationResult {
        debug!(outcome = outcome.reason_code(), detail = %detail, "verification classified");
        result.verified = false;
        result.outcome = outcome;
        result.detail = Some(detail);
        result
    }

    /// Find the candidate in the archive.
    ///
    /// With a hint only that batch is searched; otherwise batches are
    /// scanned newest first. The fuzzy fallback runs only after the
    /// exact pass has exhausted every batch.
    fn locate(
        &self,
        candidate: &LogRecord,
        batch_hint: Option<u64>,
        mode: MatchMode,
    ) -> Result<Option<(u64, SealedRecord)>, String> {
        let batch_ids = match batch_hint {
            Some(id) => vec![id],
            None => self
                .archive
                .list_batches()
                .map_err(|e| format!("listing archived batches: {e}"))?,
        };

        let mut scanned: Vec<(u64, Vec<SealedRecord>)> = Vec::new();
        for batch_id in batch_ids {
            let records = match self
                .archive
                .read_records(batch_id)
                .map_err(|e| format!("reading records of batch {batch_id}: {e}"))?
            {
                Some(records) => records,
                // A hinted id that was never archived is an absence.
                None => continue,
            };

            if let Some(found) = records.iter().find(|s| s.record == *candidate) {
                return Ok(Some((batch_id, found.clone())));
            }
            scanned.push((batch_id, records));
        }

        if mode == MatchMode::ExactThenFuzzy {
            for (batch_id, records) in scanned {
                if let Some(near) = fuzzy_match(candidate, &records) {
                    return Ok(Some((batch_id, near)));
                }
            }
        }

        Ok(None)
    }
}

/// Pick the archived record closest to the candidate, if any shares its
/// timestamp. Closeness is the number of numeric tokens the messages
/// share; ties keep the earliest record.
fn fuzzy_match(candidate: &LogRecord, records: &[SealedRecord]) -> Option<SealedRecord> {
    let tokens = numeric_tokens(&candidate.message);

    let mut best: Option<(usize, &SealedRecord)> = None;
    for sealed in records {
        if sealed.record.timestamp != candidate.timestamp {
            continue;
        }
        let stored_tokens = numeric_tokens(&sealed.record.message);
        let score = tokens
            .iter()
            .filter(|t| stored_tokens.contains(t))
            .count();
        if best.map(|(b, _)| score > b).unwrap_or(true) {
            best = Some((score, sealed));
        }
    }

    best.map(|(_, sealed)| sealed.clone())
}

/// Runs of ASCII digits in a message.
fn numeric_tokens(message: &str) -> Vec<&str> {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter(|t| !t.is_empty())
        .collect()
}
