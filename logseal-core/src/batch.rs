//! Batch metadata.
//!
//! A batch is an immutable, committed group of records sharing one Merkle
//! root. Its three persisted artifacts (metadata, record list, proof table)
//! are written once and never edited; any correction requires a new batch.

use std::collections::HashMap;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::error::{Error, Result};
use crate::proof::ProofEntry;
use crate::record::{RecordId, SealedRecord};

/// Inclusive timestamp span of a batch's records.
///
/// Bounds are the verbatim RFC 3339 strings of the earliest and latest
/// member records; Z-suffixed RFC 3339 strings order lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// Metadata of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Ledger-assigned identifier. `0` is a valid id, not an absent one.
    pub batch_id: u64,
    /// When the batch was assembled.
    pub created_at: DateTime<Utc>,
    /// Merkle root committed to the anchor.
    pub merkle_root: Hash,
    /// Number of records (equals the record list and proof table sizes).
    pub record_count: usize,
    /// Min/max timestamps of member records.
    pub time_range: TimeRange,
}

impl Batch {
    /// Build metadata for a set of sealed records.
    ///
    /// Fails on an empty set; empty batches are never committed.
    pub fn from_records(
        batch_id: u64,
        merkle_root: Hash,
        records: &[SealedRecord],
    ) -> Result<Self> {
        let first = records.first().ok_or(Error::EmptyBatch)?;

        let mut start = first.record.timestamp.as_str();
        let mut end = first.record.timestamp.as_str();
        for sealed in records {
            let ts = sealed.record.timestamp.as_str();
            if ts < start {
                start = ts;
            }
            if ts > end {
                end = ts;
            }
        }

        Ok(Self {
            batch_id,
            created_at: Utc::now(),
            merkle_root,
            record_count: records.len(),
            time_range: TimeRange {
                start: start.to_string(),
                end: end.to_string(),
            },
        })
    }

    /// Check the batch invariants against its record list and proof table.
    ///
    /// Verifies counts match, record ids are unique, every record has a
    /// proof, and the time range bounds every member timestamp.
    pub fn validate_artifacts(
        &self,
        records: &[SealedRecord],
        proofs: &HashMap<RecordId, ProofEntry>,
    ) -> Result<()> {
        if records.len() != self.record_count {
            return Err(Error::invalid_batch(format!(
                "record count {} does not match metadata {}",
                records.len(),
                self.record_count
            )));
        }
        if proofs.len() != self.record_count {
            return Err(Error::invalid_batch(format!(
                "proof count {} does not match metadata {}",
                proofs.len(),
                self.record_count
            )));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for sealed in records {
            if !seen.insert(&sealed.id) {
                return Err(Error::invalid_batch(format!(
                    "duplicate record id {}",
                    sealed.id
                )));
            }
            if !proofs.contains_key(&sealed.id) {
                return Err(Error::invalid_batch(format!(
                    "missing proof for record {}",
                    sealed.id
                )));
            }
            let ts = sealed.record.timestamp.as_str();
            if ts < self.time_range.start.as_str() || ts > self.time_range.end.as_str() {
                return Err(Error::invalid_batch(format!(
                    "timestamp {ts} outside batch time range"
                )));
            }
        }

        Ok(())
    }
}
