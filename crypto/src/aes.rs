use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::nonce::random_bytes;

/// PBKDF2 salt length, persisted per file.
pub const SALT_LEN: usize = 8;
/// AES-GCM initialization vector length, persisted per file.
pub const IV_LEN: usize = 12;
/// AES-128 key length.
pub const KEY_LEN: usize = 16;

const PBKDF2_ROUNDS: u32 = 4096;

/// Derive an AES-128 key from a passphrase with PBKDF2-HMAC-SHA1.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha1>(passphrase, salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt `data` under a key derived from `passphrase` with fresh random
/// parameters. Returns the ciphertext together with the salt and IV that must
/// be retained to decrypt it.
pub fn encrypt_data(
    data: &[u8],
    passphrase: &[u8],
) -> Result<(Vec<u8>, [u8; SALT_LEN], [u8; IV_LEN]), CryptoError> {
    let salt = random_bytes::<SALT_LEN>();
    let iv = random_bytes::<IV_LEN>();

    let key = Zeroizing::new(derive_key(passphrase, &salt));
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key.as_ref()));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), data)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok((ciphertext, salt, iv))
}

/// Decrypt `data` with an already-derived key and the retained IV.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` when the GCM tag does not
/// authenticate, which covers both a wrong passphrase and a tampered
/// ciphertext.
pub fn decrypt_data(data: &[u8], key: &[u8; KEY_LEN], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(iv), data)
        .map_err(|_| CryptoError::DecryptionFailed)
}
