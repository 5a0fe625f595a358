//! Merkle tree construction over sealed records.
//!
//! Pure functions, no I/O. The tree uses two rules that together make the
//! root a function of the leaf-hash multiset alone:
//!
//! - leaves are sorted ascending before pairing, so intake order never
//!   leaks into the committed root;
//! - within each pair the two hashes are sorted before combining
//!   ([`hash_pair`]), so a proof is an unordered sibling list and a
//!   verifier needs no left/right bookkeeping.
//!
//! An odd node at any level is promoted unchanged to the next level.

use std::collections::HashMap;

use crate::crypto::{hash_pair, Hash};
use crate::error::{Error, Result};
use crate::proof::ProofEntry;
use crate::record::{RecordId, SealedRecord};

/// Output of building one batch: the root plus one proof per record.
#[derive(Debug, Clone)]
pub struct MerkleBatch {
    /// Root committed to the anchor.
    pub root: Hash,
    /// Inclusion proofs keyed by record id.
    pub proofs: HashMap<RecordId, ProofEntry>,
}

/// Build the Merkle tree for a batch of sealed records.
///
/// Fails on empty input; a single record yields a root equal to its leaf
/// hash and an empty sibling path.
pub fn build(records: &[SealedRecord]) -> Result<MerkleBatch> {
    if records.is_empty() {
        return Err(Error::EmptyBatch);
    }

    // Leaf position assignment: sort record indices by leaf hash. Ties
    // (identical records) keep drain order, which only means identical
    // proofs for identical leaves.
    let leaf_hashes: Vec<Hash> = records.iter().map(|s| s.record.leaf_hash()).collect();
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| leaf_hashes[a].cmp(&leaf_hashes[b]));

    let sorted_leaves: Vec<Hash> = order.iter().map(|&i| leaf_hashes[i]).collect();
    let levels = build_levels(sorted_leaves);
    let root = levels
        .last()
        .and_then(|level| level.first())
        .copied()
        .ok_or(Error::EmptyBatch)?;

    let mut proofs = HashMap::with_capacity(records.len());
    for (position, &record_index) in order.iter().enumerate() {
        let sealed = &records[record_index];
        proofs.insert(
            sealed.id.clone(),
            ProofEntry {
                record_id: sealed.id.clone(),
                index: position,
                leaf_hash: leaf_hashes[record_index],
                siblings: sibling_path(&levels, position),
            },
        );
    }

    Ok(MerkleBatch { root, proofs })
}

/// Recompute a root from a leaf hash and its sibling path.
pub fn verify_proof(leaf: Hash, siblings: &[Hash], root: Hash) -> bool {
    let computed = siblings.iter().fold(leaf, |acc, &sib| hash_pair(acc, sib));
    computed == root
}

/// Build every tree level bottom-up, starting from the given leaf layer.
fn build_levels(leaves: Vec<Hash>) -> Vec<Vec<Hash>> {
    let mut levels = vec![leaves];

    while levels
        .last()
        .map(|level| level.len() > 1)
        .unwrap_or(false)
    {
        let current = levels.last().expect("levels is never empty");
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        for pair in current.chunks(2) {
            match pair {
                [a, b] => next.push(hash_pair(*a, *b)),
                // Odd node: promoted unchanged.
                [a] => next.push(*a),
                _ => unreachable!("chunks(2) yields one or two elements"),
            }
        }
        levels.push(next);
    }

    levels
}

/// Collect the sibling hashes met while climbing from leaf `position`.
///
/// A promoted node has no sibling at that level and contributes nothing
/// to the path.
fn sibling_path(levels: &[Vec<Hash>], position: usize) -> Vec<Hash> {
    let mut path = Vec::new();
    let mut idx = position;

    for level in &levels[..levels.len().saturating_sub(1)] {
        let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        if sibling < level.len() {
            path.push(level[sibling]);
        }
        idx /= 2;
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LogLevel, LogRecord};

    fn batch(n: usize) -> Vec<SealedRecord> {
        let records = (0..n)
            .map(|i| {
                LogRecord::new(
                    format!("2025-03-31T10:{:02}:00Z", i % 60),
                    LogLevel::Info,
                    format!("message {i}"),
                    "merkle-test",
                )
                .unwrap()
            })
            .collect();
        SealedRecord::seal_all(records)
    }

    #[test]
    fn test_build_empty_fails() {
        assert!(matches!(build(&[]), Err(Error::EmptyBatch)));
    }

    #[test]
    fn test_single_record() {
        let records = batch(1);
        let built = build(&records).unwrap();

        assert_eq!(built.root, records[0].record.leaf_hash());
        let proof = &built.proofs[&records[0].id];
        assert!(proof.siblings.is_empty());
        assert!(verify_proof(proof.leaf_hash, &proof.siblings, built.root));
    }

    #[test]
    fn test_proofs_sound_for_all_sizes() {
        // Covers even, odd, and power-of-two leaf counts.
        for n in [2, 3, 4, 5, 7, 8, 13] {
            let records = batch(n);
            let built = build(&records).unwrap();
            assert_eq!(built.proofs.len(), n);

            for sealed in &records {
                let proof = &built.proofs[&sealed.id];
                assert_eq!(proof.leaf_hash, sealed.record.leaf_hash());
                assert!(
                    verify_proof(proof.leaf_hash, &proof.siblings, built.root),
                    "proof failed for {} in batch of {n}",
                    sealed.id
                );
            }
        }
    }

    #[test]
    fn test_root_independent_of_order() {
        let records = batch(6);
        let built = build(&records).unwrap();

        let mut reversed = records.clone();
        reversed.reverse();
        // Re-seal so ids reflect the new order; the root must not care.
        let reversed: Vec<SealedRecord> = reversed
            .into_iter()
            .enumerate()
            .map(|(i, s)| SealedRecord::new(i, s.record))
            .collect();

        assert_eq!(build(&reversed).unwrap().root, built.root);
    }

    #[test]
    fn test_root_sensitive_to_content() {
        let records = batch(4);
        let built = build(&records).unwrap();

        let mut tampered = records.clone();
        tampered[2].record.message = "tampered".to_string();
        assert_ne!(build(&tampered).unwrap().root, built.root);
    }

    #[test]
    fn test_wrong_leaf_fails_verification() {
        let records = batch(8);
        let built = build(&records).unwrap();

        let proof = &built.proofs[&records[0].id];
        let wrong_leaf = records[1].record.leaf_hash();
        assert!(!verify_proof(wrong_leaf, &proof.siblings, built.root));
    }

    #[test]
    fn test_tampered_sibling_fails_verification() {
        let records = batch(5);
        let built = build(&records).unwrap();

        let proof = &built.proofs[&records[3].id];
        let mut siblings = proof.siblings.clone();
        siblings[0] = Hash::ZERO;
        assert!(!verify_proof(proof.leaf_hash, &siblings, built.root));
    }
}
