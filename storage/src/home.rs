use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filebank_proto::BankError;

/// Root of all persistent state, shared by both roles:
///
/// ```text
/// <home>/
///   server/               server key and one directory per bank
///   client/               one srv_<name> directory per known server
///   downloads/            decrypted file outputs
///   cert/                 optional TLS material
/// ```
#[derive(Debug, Clone)]
pub struct BankHome {
    root: PathBuf,
}

impl BankHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn server_dir(&self) -> PathBuf {
        self.root.join("server")
    }

    pub fn client_dir(&self) -> PathBuf {
        self.root.join("client")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn cert_dir(&self) -> PathBuf {
        self.root.join("cert")
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.cert_dir().join("filebank-ca-cert.pem")
    }

    pub fn server_cert_path(&self) -> PathBuf {
        self.cert_dir().join("filebank-server-cert.pem")
    }

    pub fn server_cert_key_path(&self) -> PathBuf {
        self.cert_dir().join("filebank-server-key.pem")
    }

    /// Create the directory layout. Idempotent for an existing home.
    pub fn init(&self) -> Result<(), BankError> {
        for dir in [
            self.server_dir(),
            self.client_dir(),
            self.downloads_dir(),
            self.cert_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(io_internal)?;
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.root.is_dir()
            && self.server_dir().is_dir()
            && self.client_dir().is_dir()
            && self.downloads_dir().is_dir()
    }

    pub fn ensure_well_formed(&self) -> Result<(), BankError> {
        if self.is_well_formed() {
            Ok(())
        } else {
            Err(BankError::HomeMalformed(format!(
                "{} does not exist or is missing required subdirectories",
                self.root.display()
            )))
        }
    }
}

pub(crate) fn io_internal(err: io::Error) -> BankError {
    BankError::Internal(err.to_string())
}
