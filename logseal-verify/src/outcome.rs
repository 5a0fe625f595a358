//! Verification outcomes and the result report.
//!
//! The outcome taxonomy keeps three failure families apart:
//!
//! - absence: the candidate is simply not in the archive;
//! - integrity: the candidate or the archive contradicts the anchored
//!   root, which is evidence of tampering;
//! - operational: the check itself could not be completed and says
//!   nothing about the data.

use chrono::{DateTime, Utc};
use logseal_core::record::{FieldDiff, RecordId};
use serde::Serialize;

/// Family of a verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Absence,
    Integrity,
    Operational,
}

/// Terminal state of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyOutcome {
    /// The candidate is archived and its proof recomputes to the
    /// anchored root.
    Verified,
    /// No archived record matches the candidate.
    LogNotFound,
    /// The candidate's leaf hash differs from the archived proof's.
    LogHashMismatch,
    /// The anchored root is not a well-formed 32-byte hash.
    InvalidMerkleRoot,
    /// The proof does not recompute to the anchored root.
    MerkleProofInvalid,
    /// The candidate differs field-wise from the located record.
    LogContentMismatch,
    /// The ledger has no root under the batch id.
    AnchorNotFound,
    /// The check could not be completed; retrying may succeed.
    VerificationError,
}

impl VerifyOutcome {
    /// Stable wire name of the outcome.
    pub fn reason_code(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified => "VERIFIED",
            VerifyOutcome::LogNotFound => "LOG_NOT_FOUND",
            VerifyOutcome::LogHashMismatch => "LOG_HASH_MISMATCH",
            VerifyOutcome::InvalidMerkleRoot => "INVALID_MERKLE_ROOT",
            VerifyOutcome::MerkleProofInvalid => "MERKLE_PROOF_INVALID",
            VerifyOutcome::LogContentMismatch => "LOG_CONTENT_MISMATCH",
            VerifyOutcome::AnchorNotFound => "ANCHOR_NOT_FOUND",
            VerifyOutcome::VerificationError => "VERIFICATION_ERROR",
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            VerifyOutcome::Verified => OutcomeKind::Success,
            VerifyOutcome::LogNotFound => OutcomeKind::Absence,
            VerifyOutcome::LogHashMismatch
            | VerifyOutcome::InvalidMerkleRoot
            | VerifyOutcome::MerkleProofInvalid
            | VerifyOutcome::LogContentMismatch => OutcomeKind::Integrity,
            VerifyOutcome::AnchorNotFound | VerifyOutcome::VerificationError => {
                OutcomeKind::Operational
            }
        }
    }
}

/// Full report of one verification run.
///
/// Optional fields are filled as far as the pipeline got before reaching
/// its terminal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// True only for [`VerifyOutcome::Verified`].
    pub verified: bool,
    pub outcome: VerifyOutcome,
    /// Batch the record was located in.
    pub batch_id: Option<u64>,
    /// Id of the located record within its batch.
    pub record_id: Option<RecordId>,
    /// Root string as stored by the ledger, verbatim.
    pub anchored_root: Option<String>,
    pub anchored_at: Option<DateTime<Utc>>,
    /// Field-level differences, present for content mismatches.
    pub discrepancies: Vec<FieldDiff>,
    /// Human-readable context for non-success outcomes.
    pub detail: Option<String>,
}

impl VerificationResult {
    pub(crate) fn new(outcome: VerifyOutcome) -> Self {
        Self {
            verified: outcome == VerifyOutcome::Verified,
            outcome,
            batch_id: None,
            record_id: None,
            anchored_root: None,
            anchored_at: None,
            discrepancies: Vec::new(),
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(VerifyOutcome::Verified.reason_code(), "VERIFIED");
        assert_eq!(VerifyOutcome::LogNotFound.reason_code(), "LOG_NOT_FOUND");
        assert_eq!(
            VerifyOutcome::LogContentMismatch.reason_code(),
            "LOG_CONTENT_MISMATCH"
        );
        assert_eq!(
            VerifyOutcome::MerkleProofInvalid.reason_code(),
            "MERKLE_PROOF_INVALID"
        );
    }

    #[test]
    fn test_outcome_serializes_as_reason_code() {
        for outcome in [
            VerifyOutcome::Verified,
            VerifyOutcome::LogNotFound,
            VerifyOutcome::LogHashMismatch,
            VerifyOutcome::InvalidMerkleRoot,
            VerifyOutcome::MerkleProofInvalid,
            VerifyOutcome::LogContentMismatch,
            VerifyOutcome::AnchorNotFound,
            VerifyOutcome::VerificationError,
        ] {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.reason_code()));
        }
    }

    #[test]
    fn test_kind_families() {
        assert_eq!(VerifyOutcome::Verified.kind(), OutcomeKind::Success);
        assert_eq!(VerifyOutcome::LogNotFound.kind(), OutcomeKind::Absence);
        assert_eq!(VerifyOutcome::LogHashMismatch.kind(), OutcomeKind::Integrity);
        assert_eq!(
            VerifyOutcome::LogContentMismatch.kind(),
            OutcomeKind::Integrity
        );
        assert_eq!(
            VerifyOutcome::AnchorNotFound.kind(),
            OutcomeKind::Operational
        );
        assert_eq!(
            VerifyOutcome::VerificationError.kind(),
            OutcomeKind::Operational
        );
    }
}
