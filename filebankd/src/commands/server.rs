use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use zeroize::Zeroizing;

use filebank_crypto::ed25519::BankKeypair;
use filebank_proto::config::FileBankConfig;
use filebank_server::context::ServerContext;
use filebank_storage::BankHome;

use crate::ServerCommands;

pub async fn run(
    home: BankHome,
    config: FileBankConfig,
    command: ServerCommands,
) -> anyhow::Result<()> {
    match command {
        ServerCommands::Add {
            address,
            port,
            name,
        } => {
            let port = port.unwrap_or(config.server_port);
            let host = format!("{address}:{port}");
            filebank_client::call_add_node(&home, &name, &host).await?;
            println!("Added server '{name}' at {host}");
            Ok(())
        }
        ServerCommands::List => {
            home.ensure_well_formed()?;
            let servers = home.client_list_servers()?;
            println!("{:>20}      {:>20}", "Name", "Host");
            println!("===========================================================");
            for (name, host) in servers {
                println!("{name:>20}      {host:>20}");
            }
            Ok(())
        }
        ServerCommands::Start {
            address,
            port,
            passphrase,
        } => {
            home.ensure_well_formed()?;
            let address = address.unwrap_or(config.bind_address);
            let port = port.unwrap_or(config.bind_port);
            let passphrase = read_passphrase(passphrase, "Server key passphrase: ")?;
            let keypair = load_or_generate_key(&home, &passphrase)?;
            let ctx = Arc::new(ServerContext::new(home, keypair)?);
            let addr: SocketAddr = format!("{address}:{port}")
                .parse()
                .context("invalid bind address")?;
            filebank_server::run_server(ctx, addr).await;
            Ok(())
        }
    }
}

fn load_or_generate_key(home: &BankHome, passphrase: &[u8]) -> anyhow::Result<BankKeypair> {
    if home.server_key_exists() {
        let pem_text = home.read_server_key()?;
        Ok(BankKeypair::import_encrypted(&pem_text, passphrase)?)
    } else {
        let keypair = BankKeypair::generate();
        home.write_server_key(&keypair.export_encrypted(passphrase)?)?;
        log::info!("generated a new server key");
        Ok(keypair)
    }
}

/// Take the passphrase from the flag when given, otherwise prompt for it on
/// the terminal. Either way the bytes are zeroized on drop.
pub(crate) fn read_passphrase(
    flag: Option<String>,
    prompt: &str,
) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let passphrase = match flag {
        Some(value) => value,
        None => rpassword::prompt_password(prompt)?,
    };
    Ok(Zeroizing::new(passphrase.into_bytes()))
}
