use log::info;

use filebank_crypto::ed25519::{import_public_key_pem, verify_signature};
use filebank_crypto::nonce::random_nonce;
use filebank_proto::descriptor::ServerDescriptor;
use filebank_proto::messages::{sign_bytes, SignAddNodeServer};
use filebank_proto::wire::{decode_array, encode_bytes, AddNodeRequest};
use filebank_proto::{BankError, ADDNODE_TIMEOUT_SECS};
use filebank_storage::BankHome;

use crate::client::NodeClient;

/// Introduce ourselves to a node and pin its identity under a local name.
/// Here the client is the challenger: the server proves possession of its
/// key by signing our nonce alongside the key it presents.
pub async fn call_add_node(
    home: &BankHome,
    server_name: &str,
    host: &str,
) -> Result<(), BankError> {
    home.ensure_well_formed()?;
    if home.client_server_exists(server_name) {
        return Err(BankError::AlreadyExists(format!("server {server_name}")));
    }

    let client = NodeClient::connect(home, host, ADDNODE_TIMEOUT_SECS)?;
    let nonce = random_nonce();
    let response = client
        .add_node(&AddNodeRequest {
            nonce: encode_bytes(&nonce),
        })
        .await?;

    if decode_array::<12>(&response.nonce)? != nonce {
        return Err(BankError::BadNonce);
    }
    let pub_key = import_public_key_pem(&response.pub_key)?;
    let signature: [u8; 64] = decode_array(&response.signature)?;
    let shape = SignAddNodeServer {
        nonce,
        pub_key_pem: response.pub_key.clone(),
    };
    verify_signature(&pub_key, &sign_bytes(&shape)?, &signature)?;

    home.client_write_server_descriptor(
        server_name,
        &ServerDescriptor {
            host: host.to_string(),
            pub_key_pem: response.pub_key,
        },
    )?;
    info!("added server {server_name} at {host}");
    Ok(())
}
