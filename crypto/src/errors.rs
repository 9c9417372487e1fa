use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("bad passphrase")]
    BadPassphrase,
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    #[error("malformed pem: {0}")]
    MalformedPem(String),
}
