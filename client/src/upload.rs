use std::path::PathBuf;

use log::info;
use merkle::MerkleTree;

use filebank_crypto::aes::encrypt_data;
use filebank_crypto::ed25519::{import_public_key_pem, verify_signature, BankKeypair};
use filebank_crypto::nonce::random_nonce;
use filebank_proto::descriptor::{BankFileEntry, ClientBankDescriptor};
use filebank_proto::messages::{sign_bytes, SignMerkleRootServer, SignUploadRequestClient};
use filebank_proto::wire::{
    decode_array, encode_bytes, UploadCommitRequest, UploadFileRequest, UploadInitRequest,
};
use filebank_proto::{BankError, BANK_TIMEOUT_SECS};
use filebank_storage::files::read_files;
use filebank_storage::BankHome;

use crate::client::NodeClient;

/// Create a bank: encrypt every file, commit to the ciphertexts locally,
/// stream them to the server, and only persist the bank descriptor once the
/// server attests a root identical to ours under our closing nonce.
pub async fn call_upload_files(
    home: &BankHome,
    server_name: &str,
    bank_name: &str,
    paths: &[PathBuf],
    passphrase: &[u8],
) -> Result<(), BankError> {
    home.ensure_well_formed()?;
    let server = home.client_server_descriptor(server_name)?;
    if home.client_bank_exists(server_name, bank_name) {
        return Err(BankError::AlreadyExists(format!(
            "bank {server_name}:{bank_name}"
        )));
    }

    let (names, plaintexts) = read_files(paths)?;
    if plaintexts.is_empty() {
        return Err(BankError::NotFoundLocal("no files to upload".to_string()));
    }

    // per-file crypto: fresh salt and IV each, parameters retained locally
    let mut ciphertexts = Vec::with_capacity(plaintexts.len());
    let mut entries = Vec::with_capacity(plaintexts.len());
    for (name, data) in names.into_iter().zip(&plaintexts) {
        let (ciphertext, salt, iv) = encrypt_data(data, passphrase)?;
        ciphertexts.push(ciphertext);
        entries.push(BankFileEntry { name, salt, iv });
    }

    let tree =
        MerkleTree::build(&ciphertexts).map_err(|e| BankError::Internal(e.to_string()))?;
    let local_root = tree.root();

    // a fresh key-pair is the bank's identity; the server only ever sees the
    // public half
    let keypair = BankKeypair::generate();
    let pub_key_pem = keypair.public_key_pem()?;
    let nb_files = ciphertexts.len() as i32;

    let client = NodeClient::connect(home, &server.host, BANK_TIMEOUT_SECS)?;
    let open = client.upload_open().await?;
    let server_nonce: [u8; 12] = decode_array(&open.nonce)?;

    let shape = SignUploadRequestClient {
        nonce: server_nonce,
        pub_key_pem: pub_key_pem.clone(),
        nb_files,
    };
    let signature = keypair.sign(&sign_bytes(&shape)?);
    client
        .upload_init(&UploadInitRequest {
            nonce: open.nonce.clone(),
            pub_key: pub_key_pem,
            nb_files,
            signature: encode_bytes(&signature),
        })
        .await?;

    for (i, ciphertext) in ciphertexts.iter().enumerate() {
        client
            .upload_file(&UploadFileRequest {
                nonce: open.nonce.clone(),
                seq: i as i32 + 1,
                content: encode_bytes(ciphertext),
            })
            .await?;
    }

    let client_nonce = random_nonce();
    let commit = client
        .upload_commit(&UploadCommitRequest {
            nonce: open.nonce.clone(),
            client_nonce: encode_bytes(&client_nonce),
        })
        .await?;

    // closing checks, in order: our nonce, the server's signature over it,
    // and root equality; any failure means nothing is persisted locally
    if decode_array::<12>(&commit.nonce)? != client_nonce {
        return Err(BankError::BadNonce);
    }
    let server_key = import_public_key_pem(&server.pub_key_pem)?;
    let server_root: [u8; 32] = decode_array(&commit.merkle_root)?;
    let response_signature: [u8; 64] = decode_array(&commit.signature)?;
    let shape = SignMerkleRootServer {
        nonce: client_nonce,
        merkle_root: server_root,
    };
    verify_signature(&server_key, &sign_bytes(&shape)?, &response_signature)?;
    if server_root != local_root {
        return Err(BankError::RootMismatch);
    }

    let descriptor = ClientBankDescriptor {
        enc_priv_key_pem: keypair.export_encrypted(passphrase)?,
        nb_files: ciphertexts.len() as u32,
        merkle_root: local_root,
        files: entries,
    };
    home.client_write_bank_descriptor(server_name, bank_name, &descriptor)?;

    info!(
        "created bank {server_name}:{bank_name} with {} files",
        ciphertexts.len()
    );
    Ok(())
}
