use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::aes;
use crate::errors::CryptoError;
use crate::hash::hash_once;

const ENCRYPTED_KEY_TAG: &str = "FILEBANK ENCRYPTED PRIVATE KEY";

/// An ed25519 key-pair owning a bank (client side) or a server identity.
///
/// The secret seed only ever lives inside this type; at rest it is exported
/// through [`BankKeypair::export_encrypted`].
pub struct BankKeypair {
    signing_key: SigningKey,
}

impl BankKeypair {
    /// Generate a fresh key-pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// PEM-wrapped SubjectPublicKeyInfo encoding of the public key. This is
    /// the exact byte sequence other parties hash to address the key owner.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        export_public_key_pem(&self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Export the secret seed as an encrypted PEM block. The payload is
    /// `salt || iv || AES-128-GCM(seed)` under a PBKDF2-derived key.
    pub fn export_encrypted(&self, passphrase: &[u8]) -> Result<String, CryptoError> {
        let (ciphertext, salt, iv) = aes::encrypt_data(self.signing_key.as_bytes(), passphrase)?;

        let mut contents = Vec::with_capacity(aes::SALT_LEN + aes::IV_LEN + ciphertext.len());
        contents.extend_from_slice(&salt);
        contents.extend_from_slice(&iv);
        contents.extend_from_slice(&ciphertext);

        Ok(pem::encode(&pem::Pem::new(ENCRYPTED_KEY_TAG, contents)))
    }

    /// Reverse of [`BankKeypair::export_encrypted`].
    ///
    /// # Errors
    ///
    /// `CryptoError::BadPassphrase` when the GCM tag does not authenticate.
    pub fn import_encrypted(pem_text: &str, passphrase: &[u8]) -> Result<Self, CryptoError> {
        let block = pem::parse(pem_text).map_err(|e| CryptoError::MalformedPem(e.to_string()))?;
        if block.tag() != ENCRYPTED_KEY_TAG {
            return Err(CryptoError::InvalidPrivateKey);
        }

        let contents = block.contents();
        if contents.len() <= aes::SALT_LEN + aes::IV_LEN {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let (salt, rest) = contents.split_at(aes::SALT_LEN);
        let (iv, ciphertext) = rest.split_at(aes::IV_LEN);

        let key = Zeroizing::new(aes::derive_key(passphrase, salt));
        let seed = Zeroizing::new(
            aes::decrypt_data(ciphertext, &key, iv).map_err(|_| CryptoError::BadPassphrase)?,
        );

        let mut seed_bytes: [u8; 32] = seed
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        let keypair = Self::from_seed(seed_bytes);
        seed_bytes.zeroize();
        Ok(keypair)
    }
}

impl Drop for BankKeypair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

pub fn export_public_key_pem(key: &VerifyingKey) -> Result<String, CryptoError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::MalformedPem(e.to_string()))
}

pub fn import_public_key_pem(pem_text: &str) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_public_key_pem(pem_text).map_err(|_| CryptoError::InvalidPublicKey)
}

pub fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), CryptoError> {
    let signature = Signature::from_bytes(signature);
    key.verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// The address a server files a bank under: base58 of the SHA-256 of the full
/// PEM-encoded public key.
pub fn bank_address(pub_key_pem: &str) -> String {
    bs58::encode(hash_once(pub_key_pem.as_bytes())).into_string()
}
