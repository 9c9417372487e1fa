use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::BankError;

// Signatures never cover raw wire bytes: each protocol step serializes one of
// the shapes below and signs that. A shape is identified by its field set, so
// the verifier reconstructs the shape it expects at that step and any
// divergence fails verification.

/// Signed by the server when introducing itself to a client.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct SignAddNodeServer {
    pub nonce: [u8; 12],
    pub pub_key_pem: String,
}

/// Signed by the client with the bank key to open an upload.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct SignUploadRequestClient {
    pub nonce: [u8; 12],
    pub pub_key_pem: String,
    pub nb_files: i32,
}

/// Signed by the server with its long-lived key to attest the persisted root.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct SignMerkleRootServer {
    pub nonce: [u8; 12],
    pub merkle_root: [u8; 32],
}

/// Signed by the client with the bank key to request one file. The bank is
/// addressed by the hash of its public key, so the key itself stays local.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct SignDownloadRequestClient {
    pub nonce: [u8; 12],
    pub pub_key_addr_b58: String,
    pub file_num: i32,
}

/// Canonical byte serialization of a message shape: fixed field order,
/// length-prefixed strings, fixed-width little-endian integers.
pub fn sign_bytes<T: BorshSerialize>(shape: &T) -> Result<Vec<u8>, BankError> {
    borsh::to_vec(shape).map_err(|e| BankError::Internal(e.to_string()))
}
