//! Property-based tests for the Merkle engine.
//!
//! Uses proptest to verify the determinism and soundness properties hold
//! for arbitrary record sets.

use proptest::prelude::*;

use crate::merkle::{build, verify_proof};
use crate::record::{LogLevel, LogRecord, SealedRecord};

// ============================================================================
// Arbitrary Implementations
// ============================================================================

/// Generate arbitrary LogLevel values.
fn arb_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Error),
        Just(LogLevel::Warn),
        Just(LogLevel::Info),
        Just(LogLevel::Debug),
        Just(LogLevel::Trace),
    ]
}

/// Generate arbitrary valid LogRecord values.
fn arb_record() -> impl Strategy<Value = LogRecord> {
    (
        0u32..24,
        0u32..60,
        arb_level(),
        "[a-zA-Z0-9 .:%-]{0,64}",
        "[a-z-]{1,24}",
    )
        .prop_map(|(hour, minute, level, message, source)| {
            LogRecord::new(
                format!("2025-03-31T{hour:02}:{minute:02}:00Z"),
                level,
                message,
                source,
            )
            .expect("generated record is valid")
        })
}

/// Generate a non-empty batch of sealed records.
fn arb_batch() -> impl Strategy<Value = Vec<SealedRecord>> {
    prop::collection::vec(arb_record(), 1..32).prop_map(SealedRecord::seal_all)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Any permutation of the same records yields the same root.
    #[test]
    fn prop_root_is_permutation_invariant(records in arb_batch(), seed in any::<u64>()) {
        let root = build(&records).unwrap().root;

        // Deterministic pseudo-shuffle driven by the seed.
        let mut shuffled: Vec<_> = records.iter().map(|s| s.record.clone()).collect();
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let reshuffled = SealedRecord::seal_all(shuffled);
        prop_assert_eq!(build(&reshuffled).unwrap().root, root);
    }

    /// Every record's proof recomputes to the batch root.
    #[test]
    fn prop_all_proofs_sound(records in arb_batch()) {
        let built = build(&records).unwrap();
        prop_assert_eq!(built.proofs.len(), records.len());

        for sealed in &records {
            let proof = &built.proofs[&sealed.id];
            prop_assert_eq!(proof.leaf_hash, sealed.record.leaf_hash());
            prop_assert!(verify_proof(proof.leaf_hash, &proof.siblings, built.root));
        }
    }

    /// Mutating any record's message changes the root.
    #[test]
    fn prop_tamper_changes_root(records in arb_batch(), victim in any::<prop::sample::Index>()) {
        let built = build(&records).unwrap();

        let mut tampered = records.clone();
        let idx = victim.index(tampered.len());
        tampered[idx].record.message.push_str("-tampered");

        prop_assert_ne!(build(&tampered).unwrap().root, built.root);
    }
}
