use filebank_crypto::hash::hash_twice;

use crate::merkle_tree::{combine, MerkleError};

/// An inclusion proof: the ordered sibling hashes from a leaf up to the root.
///
/// Because parents hash their children in ascending order, the proof carries
/// no direction bits; verification simply folds each sibling in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    hashes: Vec<[u8; 32]>,
}

impl MerkleProof {
    pub(crate) fn new(hashes: Vec<[u8; 32]>) -> Self {
        Self { hashes }
    }

    pub fn hashes(&self) -> &[[u8; 32]] {
        &self.hashes
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Check that `file` is committed to by `merkle_root`. An empty proof
    /// reduces to comparing the leaf against the root directly.
    pub fn verify_file(&self, file: &[u8], merkle_root: &[u8; 32]) -> bool {
        self.verify_leaf(hash_twice(file), merkle_root)
    }

    fn verify_leaf(&self, leaf: [u8; 32], merkle_root: &[u8; 32]) -> bool {
        let mut acc = leaf;
        for hash in &self.hashes {
            acc = combine(&acc, hash);
        }
        acc == *merkle_root
    }

    /// Concatenate the proof hashes for the wire. No length prefix; the
    /// recipient divides by 32.
    pub fn to_linear(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.hashes.len() * 32);
        for hash in &self.hashes {
            out.extend_from_slice(hash);
        }
        out
    }

    /// Reconstitute a proof from its linearized form.
    pub fn from_linear(bytes: &[u8]) -> Result<Self, MerkleError> {
        if bytes.len() % 32 != 0 {
            return Err(MerkleError::MalformedProof);
        }
        let hashes = bytes
            .chunks_exact(32)
            .map(|chunk| {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();
        Ok(Self { hashes })
    }
}
