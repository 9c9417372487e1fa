use std::path::PathBuf;

use log::info;
use merkle::MerkleProof;
use zeroize::Zeroizing;

use filebank_crypto::aes::{decrypt_data, derive_key};
use filebank_crypto::ed25519::{bank_address, BankKeypair};
use filebank_proto::messages::{sign_bytes, SignDownloadRequestClient};
use filebank_proto::wire::{decode_array, decode_bytes, encode_bytes, DownloadRequest};
use filebank_proto::{BankError, BANK_TIMEOUT_SECS};
use filebank_storage::BankHome;

use crate::client::NodeClient;

/// Retrieve one file of a bank, verify its inclusion proof against the
/// retained root, and decrypt it into `downloads/`. Decryption only happens
/// after the proof checks out.
pub async fn call_download_file(
    home: &BankHome,
    server_name: &str,
    bank_name: &str,
    file_num: i32,
    passphrase: &[u8],
) -> Result<PathBuf, BankError> {
    home.ensure_well_formed()?;
    let server = home.client_server_descriptor(server_name)?;
    let descriptor = home.client_bank_descriptor(server_name, bank_name)?;

    if file_num < 1 || file_num as u32 > descriptor.nb_files {
        return Err(BankError::OutOfRange(format!(
            "file number {file_num} outside 1..={}",
            descriptor.nb_files
        )));
    }

    // the bank key is only in memory for the duration of this exchange
    let keypair = BankKeypair::import_encrypted(&descriptor.enc_priv_key_pem, passphrase)?;
    let address = bank_address(&keypair.public_key_pem()?);

    let client = NodeClient::connect(home, &server.host, BANK_TIMEOUT_SECS)?;
    let open = client.download_open().await?;
    let nonce: [u8; 12] = decode_array(&open.nonce)?;

    let shape = SignDownloadRequestClient {
        nonce,
        pub_key_addr_b58: address.clone(),
        file_num,
    };
    let signature = keypair.sign(&sign_bytes(&shape)?);
    let response = client
        .download(&DownloadRequest {
            nonce: open.nonce.clone(),
            pub_key_addr: address,
            file_num,
            signature: encode_bytes(&signature),
        })
        .await?;

    let proof_bytes = decode_bytes(&response.proof)?;
    let proof = MerkleProof::from_linear(&proof_bytes)
        .map_err(|_| BankError::Malformed("proof length is not a multiple of 32".to_string()))?;
    let ciphertext = decode_bytes(&response.file)?;

    if !proof.verify_file(&ciphertext, &descriptor.merkle_root) {
        return Err(BankError::ProofFailed);
    }

    let entry = &descriptor.files[file_num as usize - 1];
    let key = Zeroizing::new(derive_key(passphrase, &entry.salt));
    let plaintext = decrypt_data(&ciphertext, &key, &entry.iv).map_err(|_| BankError::Corrupt)?;

    let path = home.write_download(&entry.name, &plaintext)?;
    info!("downloaded {} to {}", entry.name, path.display());
    Ok(path)
}
