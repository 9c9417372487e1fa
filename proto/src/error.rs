use filebank_crypto::CryptoError;
use thiserror::Error;

/// The error kinds surfaced to callers on both peers.
///
/// Protocol failures abort the exchange; there are no in-band error messages
/// beyond the terminating reply that carries one of these kinds.
/// `ProofFailed`, `RootMismatch` and `BadSignature` are integrity violations
/// and are never downgraded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("home directory is malformed: {0}")]
    HomeMalformed(String),
    #[error("not found: {0}")]
    NotFoundLocal(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("bad passphrase")]
    BadPassphrase,
    #[error("nonce does not match challenge")]
    BadNonce,
    #[error("signature verification failed")]
    BadSignature,
    #[error("order violation: {0}")]
    OrderViolation(String),
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("merkle proof does not match retained root")]
    ProofFailed,
    #[error("server merkle root differs from locally computed root")]
    RootMismatch,
    #[error("ciphertext failed authentication")]
    Corrupt,
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl BankError {
    /// Stable kind token used to carry the error across the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            BankError::HomeMalformed(_) => "HomeMalformed",
            BankError::NotFoundLocal(_) => "NotFoundLocal",
            BankError::AlreadyExists(_) => "AlreadyExists",
            BankError::OutOfRange(_) => "OutOfRange",
            BankError::BadPassphrase => "BadPassphrase",
            BankError::BadNonce => "BadNonce",
            BankError::BadSignature => "BadSignature",
            BankError::OrderViolation(_) => "OrderViolation",
            BankError::Malformed(_) => "Malformed",
            BankError::ProofFailed => "ProofFailed",
            BankError::RootMismatch => "RootMismatch",
            BankError::Corrupt => "Corrupt",
            BankError::Transport(_) => "Transport",
            BankError::Internal(_) => "Internal",
        }
    }

    /// Rebuild the typed error from a wire kind token and message.
    pub fn from_wire(kind: &str, message: String) -> BankError {
        match kind {
            "HomeMalformed" => BankError::HomeMalformed(message),
            "NotFoundLocal" => BankError::NotFoundLocal(message),
            "AlreadyExists" => BankError::AlreadyExists(message),
            "OutOfRange" => BankError::OutOfRange(message),
            "BadPassphrase" => BankError::BadPassphrase,
            "BadNonce" => BankError::BadNonce,
            "BadSignature" => BankError::BadSignature,
            "OrderViolation" => BankError::OrderViolation(message),
            "Malformed" => BankError::Malformed(message),
            "ProofFailed" => BankError::ProofFailed,
            "RootMismatch" => BankError::RootMismatch,
            "Corrupt" => BankError::Corrupt,
            "Transport" => BankError::Transport(message),
            _ => BankError::Internal(message),
        }
    }
}

impl From<CryptoError> for BankError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::BadPassphrase => BankError::BadPassphrase,
            CryptoError::SignatureVerificationFailed => BankError::BadSignature,
            CryptoError::DecryptionFailed => BankError::Corrupt,
            CryptoError::EncryptionFailed(message) => BankError::Internal(message),
            CryptoError::InvalidPublicKey
            | CryptoError::InvalidPrivateKey
            | CryptoError::MalformedPem(_) => BankError::Malformed(err.to_string()),
        }
    }
}
