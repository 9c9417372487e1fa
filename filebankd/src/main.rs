mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use filebank_proto::config::FileBankConfig;
use filebank_storage::BankHome;

/// A file storage system based on merkle trees.
///
/// Files are encrypted before upload to a server, and merkle trees guarantee
/// file integrity after download from a server.
#[derive(Parser)]
#[command(name = "filebankd", version, about = "A file storage system based on merkle trees")]
struct Cli {
    /// Root directory for file-bank storage
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the home directory layout
    Init,
    /// Manage known servers, or run one
    #[command(subcommand)]
    Server(ServerCommands),
    /// Manage banks
    #[command(subcommand)]
    Bank(BankCommands),
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Add a new server running on a known host
    Add {
        /// Hostname or IP address of the server
        #[arg(short = 'a', long)]
        address: String,
        /// TCP port the service is running on; configured default when absent
        #[arg(short = 'p', long)]
        port: Option<u16>,
        /// Unique local name for the server
        name: String,
    },
    /// List locally saved servers
    List,
    /// Start a server instance on the local machine
    Start {
        /// Address to bind; configured default when absent
        #[arg(short = 'a', long)]
        address: Option<String>,
        /// TCP port to bind; configured default when absent
        #[arg(short = 'p', long)]
        port: Option<u16>,
        /// Passphrase for the server key; prompted for when absent
        #[arg(long)]
        passphrase: Option<String>,
    },
}

#[derive(Subcommand)]
enum BankCommands {
    /// Encrypt files, upload them to a server, and retain the merkle root
    Create {
        /// Local name of the target server
        #[arg(short = 's', long)]
        server: String,
        /// Unique local name for the bank
        #[arg(short = 'b', long = "bank-name")]
        bank: String,
        /// Files or directories; directories are added recursively
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Passphrase protecting the bank; prompted for when absent
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Download one file from a bank, verify its proof, and decrypt it
    Pull {
        /// Local name of the server holding the bank
        #[arg(short = 's', long)]
        server: String,
        /// Local name of the bank
        #[arg(short = 'b', long = "bank-name")]
        bank: String,
        /// Identifier of the file in the bank (1-based)
        file_num: i32,
        /// Passphrase protecting the bank; prompted for when absent
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// List banks for a server, or the files of one bank
    List {
        /// Local name of the server
        #[arg(short = 's', long)]
        server: String,
        /// Bank to list files for; omit to list the server's banks
        #[arg(short = 'b', long = "bank-name")]
        bank: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = FileBankConfig::build().map_err(anyhow::Error::msg)?;
    let home = resolve_home(cli.home, &config);
    match cli.command {
        Commands::Init => {
            home.init()?;
            println!("Initialized file-bank home at {}", home.root().display());
            Ok(())
        }
        Commands::Server(command) => commands::server::run(home, config, command).await,
        Commands::Bank(command) => commands::bank::run(home, command).await,
    }
}

fn resolve_home(flag: Option<PathBuf>, config: &FileBankConfig) -> BankHome {
    match flag {
        Some(path) => BankHome::new(path),
        None => BankHome::new(config.home_path()),
    }
}
