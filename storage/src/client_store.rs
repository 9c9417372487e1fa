use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use filebank_proto::descriptor::{ClientBankDescriptor, ServerDescriptor};
use filebank_proto::BankError;

use crate::home::{io_internal, BankHome};

const SERVER_PREFIX: &str = "srv_";
const BANK_PREFIX: &str = "bnk_";
const SERVER_DESCRIPTOR_FILE: &str = "server.desc";

/// Client-side state: one `srv_<name>` directory per known server, each
/// holding the server descriptor and one `bnk_<name>.desc` per bank.
impl BankHome {
    fn srv_dir(&self, server_name: &str) -> PathBuf {
        self.client_dir().join(format!("{SERVER_PREFIX}{server_name}"))
    }

    fn bank_descriptor_path(&self, server_name: &str, bank_name: &str) -> PathBuf {
        self.srv_dir(server_name)
            .join(format!("{BANK_PREFIX}{bank_name}.desc"))
    }

    pub fn client_server_exists(&self, server_name: &str) -> bool {
        self.srv_dir(server_name).is_dir()
    }

    pub fn client_bank_exists(&self, server_name: &str, bank_name: &str) -> bool {
        self.bank_descriptor_path(server_name, bank_name).is_file()
    }

    pub fn client_write_server_descriptor(
        &self,
        server_name: &str,
        descriptor: &ServerDescriptor,
    ) -> Result<(), BankError> {
        let dir = self.srv_dir(server_name);
        if dir.exists() {
            return Err(BankError::AlreadyExists(format!("server {server_name}")));
        }
        fs::create_dir(&dir).map_err(io_internal)?;
        fs::write(dir.join(SERVER_DESCRIPTOR_FILE), descriptor.to_bytes()?).map_err(io_internal)
    }

    pub fn client_server_descriptor(&self, server_name: &str) -> Result<ServerDescriptor, BankError> {
        let bytes = fs::read(self.srv_dir(server_name).join(SERVER_DESCRIPTOR_FILE)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BankError::NotFoundLocal(format!("server {server_name}"))
            } else {
                io_internal(e)
            }
        })?;
        ServerDescriptor::from_bytes(&bytes)
    }

    /// A bank descriptor is only ever written once, after a verified upload.
    pub fn client_write_bank_descriptor(
        &self,
        server_name: &str,
        bank_name: &str,
        descriptor: &ClientBankDescriptor,
    ) -> Result<(), BankError> {
        if !self.client_server_exists(server_name) {
            return Err(BankError::NotFoundLocal(format!("server {server_name}")));
        }
        let path = self.bank_descriptor_path(server_name, bank_name);
        if path.exists() {
            return Err(BankError::AlreadyExists(format!(
                "bank {server_name}:{bank_name}"
            )));
        }
        fs::write(path, descriptor.to_bytes()?).map_err(io_internal)
    }

    pub fn client_bank_descriptor(
        &self,
        server_name: &str,
        bank_name: &str,
    ) -> Result<ClientBankDescriptor, BankError> {
        let bytes = fs::read(self.bank_descriptor_path(server_name, bank_name)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BankError::NotFoundLocal(format!("bank {server_name}:{bank_name}"))
            } else {
                io_internal(e)
            }
        })?;
        ClientBankDescriptor::from_bytes(&bytes)
    }

    /// All known servers as `(name, host)` pairs.
    pub fn client_list_servers(&self) -> Result<Vec<(String, String)>, BankError> {
        let mut servers = Vec::new();
        for entry in fs::read_dir(self.client_dir()).map_err(io_internal)? {
            let entry = entry.map_err(io_internal)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|n| n.strip_prefix(SERVER_PREFIX)) else {
                continue;
            };
            let descriptor = self.client_server_descriptor(name)?;
            servers.push((name.to_string(), descriptor.host));
        }
        servers.sort();
        Ok(servers)
    }

    pub fn client_list_banks(&self, server_name: &str) -> Result<Vec<String>, BankError> {
        if !self.client_server_exists(server_name) {
            return Err(BankError::NotFoundLocal(format!("server {server_name}")));
        }
        let mut banks = Vec::new();
        for entry in fs::read_dir(self.srv_dir(server_name)).map_err(io_internal)? {
            let entry = entry.map_err(io_internal)?;
            let file_name = entry.file_name();
            if let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(BANK_PREFIX))
                .and_then(|n| n.strip_suffix(".desc"))
            {
                banks.push(name.to_string());
            }
        }
        banks.sort();
        Ok(banks)
    }

    /// File names of one bank, in upload order (file number = index + 1).
    pub fn client_list_bank_files(
        &self,
        server_name: &str,
        bank_name: &str,
    ) -> Result<Vec<String>, BankError> {
        let descriptor = self.client_bank_descriptor(server_name, bank_name)?;
        Ok(descriptor.files.into_iter().map(|f| f.name).collect())
    }

    /// Write a decrypted file under `downloads/`, keeping only the final path
    /// component of the recorded name.
    pub fn write_download(&self, name: &str, data: &[u8]) -> Result<PathBuf, BankError> {
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| BankError::Malformed(format!("unusable file name {name:?}")))?;
        let path = self.downloads_dir().join(file_name);
        fs::write(&path, data).map_err(io_internal)?;
        Ok(path)
    }
}
