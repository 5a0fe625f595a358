//! Logseal Verify - independent verification of archived records.
//!
//! Given a candidate record, the [`VerificationEngine`] locates it in
//! the batch archive, recomputes its inclusion proof, and checks the
//! result against the root held by the anchor ledger. Every run ends in
//! a classified [`VerificationResult`]; the engine itself never fails.

pub mod engine;
pub mod outcome;

pub use engine::{EngineConfig, MatchMode, VerificationEngine};
pub use outcome::{OutcomeKind, VerificationResult, VerifyOutcome};
