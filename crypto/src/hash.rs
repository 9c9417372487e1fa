use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn hash_once(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice. Used for merkle tree leaves.
pub fn hash_twice(data: &[u8]) -> [u8; 32] {
    let first = hash_once(data);
    hash_once(&first)
}

/// Strict lexicographic order on 32-byte hashes. Equal hashes are not less.
pub fn hash_less(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a < b
}
