use filebank_storage::files::collect_file_paths;
use filebank_storage::BankHome;

use crate::commands::server::read_passphrase;
use crate::BankCommands;

pub async fn run(home: BankHome, command: BankCommands) -> anyhow::Result<()> {
    match command {
        BankCommands::Create {
            server,
            bank,
            paths,
            passphrase,
        } => {
            home.ensure_well_formed()?;
            let mut files = Vec::new();
            for path in &paths {
                files.extend(collect_file_paths(path)?);
            }
            let passphrase = read_passphrase(passphrase, "Bank passphrase: ")?;
            filebank_client::call_upload_files(&home, &server, &bank, &files, &passphrase).await?;
            println!("Created bank '{server}:{bank}' with {} files", files.len());
            Ok(())
        }
        BankCommands::Pull {
            server,
            bank,
            file_num,
            passphrase,
        } => {
            home.ensure_well_formed()?;
            let passphrase = read_passphrase(passphrase, "Bank passphrase: ")?;
            let path =
                filebank_client::call_download_file(&home, &server, &bank, file_num, &passphrase)
                    .await?;
            println!("Saved file to {}", path.display());
            Ok(())
        }
        BankCommands::List { server, bank } => {
            home.ensure_well_formed()?;
            match bank {
                None => {
                    let banks = home.client_list_banks(&server)?;
                    println!("Banks for server '{server}'");
                    println!("=====================================");
                    for bank in banks {
                        println!("\t{bank}");
                    }
                }
                Some(bank) => {
                    let files = home.client_list_bank_files(&server, &bank)?;
                    println!("Files for bank '{server}:{bank}'");
                    println!("=====================================");
                    for (i, name) in files.iter().enumerate() {
                        println!("{:5}  {name}", i + 1);
                    }
                }
            }
            Ok(())
        }
    }
}
