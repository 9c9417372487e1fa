use base64::{engine::general_purpose, Engine as _};
use serde_derive::{Deserialize, Serialize};

use crate::error::BankError;

// JSON bodies exchanged over the transport. Binary fields are base64; public
// keys travel as PEM text; bank addresses as base58.

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeRequest {
    pub nonce: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeResponse {
    pub nonce: String,
    pub pub_key: String,
    pub signature: String,
}

/// Challenge issued when an upload or download session opens.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpenReply {
    pub nonce: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadInitRequest {
    pub nonce: String,
    pub pub_key: String,
    pub nb_files: i32,
    pub signature: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub nonce: String,
    pub seq: i32,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadCommitRequest {
    pub nonce: String,
    pub client_nonce: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MerkleRootResponse {
    pub nonce: String,
    pub merkle_root: String,
    pub signature: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub nonce: String,
    pub pub_key_addr: String,
    pub file_num: i32,
    pub signature: String,
}

/// Terminal download reply: the ciphertext plus its linearized proof.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileAndProofResponse {
    pub proof: String,
    pub file: String,
}

/// Body of every non-2xx reply.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn from_error(err: &BankError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn into_error(self) -> BankError {
        BankError::from_wire(&self.error, self.message)
    }
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn decode_bytes(value: &str) -> Result<Vec<u8>, BankError> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|_| BankError::Malformed("invalid base64 field".to_string()))
}

/// Decode a base64 field that must hold exactly `N` bytes.
pub fn decode_array<const N: usize>(value: &str) -> Result<[u8; N], BankError> {
    let bytes = decode_bytes(value)?;
    bytes
        .try_into()
        .map_err(|_| BankError::Malformed(format!("field is not {N} bytes")))
}
