//! Inclusion proofs for sealed records.

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::record::RecordId;

/// Merkle inclusion proof for one record of a batch.
///
/// `siblings` is the ordered list of hashes met while climbing from the
/// leaf to the root. Because pair hashing sorts its children, no left/right
/// positions are stored; the path alone is sufficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEntry {
    /// Id of the record this proof belongs to.
    pub record_id: RecordId,
    /// Position of the record's leaf in the (sorted) leaf layer.
    pub index: usize,
    /// Hash of the record's canonical encoding.
    pub leaf_hash: Hash,
    /// Sibling hashes from leaf to root, bottom-up.
    pub siblings: Vec<Hash>,
}
