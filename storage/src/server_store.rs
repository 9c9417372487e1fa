use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use filebank_crypto::ed25519::bank_address;
use filebank_proto::descriptor::ServerBankDescriptor;
use filebank_proto::BankError;
use log::warn;

use crate::home::{io_internal, BankHome};

const KEY_FILE: &str = "priv.key";
const DESCRIPTOR_FILE: &str = "bank.desc";

/// Server-side state: the long-lived signing key and one directory per bank,
/// named by the base58 hash of the owner's public key.
impl BankHome {
    fn bank_dir(&self, bank_id: &str) -> PathBuf {
        self.server_dir().join(bank_id)
    }

    pub fn server_key_exists(&self) -> bool {
        self.server_dir().join(KEY_FILE).is_file()
    }

    pub fn read_server_key(&self) -> Result<String, BankError> {
        fs::read_to_string(self.server_dir().join(KEY_FILE)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BankError::NotFoundLocal("server key".to_string())
            } else {
                io_internal(e)
            }
        })
    }

    pub fn write_server_key(&self, key_pem: &str) -> Result<(), BankError> {
        fs::write(self.server_dir().join(KEY_FILE), key_pem).map_err(io_internal)
    }

    pub fn server_bank_exists(&self, bank_id: &str) -> bool {
        self.bank_dir(bank_id).is_dir()
    }

    /// Persist a new bank: the descriptor plus one numbered ciphertext file
    /// per entry, atomically with respect to the directory's existence.
    ///
    /// Creating the directory is the one guard against concurrent uploads of
    /// the same bank; a failure after that point removes the directory again
    /// so a half-written bank never survives.
    pub fn server_write_bank(
        &self,
        descriptor: &ServerBankDescriptor,
        files: &[Vec<u8>],
    ) -> Result<(), BankError> {
        descriptor.validate()?;
        let bank_id = bank_address(&descriptor.pub_key_pem);
        let dir = self.bank_dir(&bank_id);

        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BankError::AlreadyExists(format!("bank {bank_id}")));
            }
            Err(e) => return Err(io_internal(e)),
        }

        if let Err(err) = write_bank_contents(&dir, descriptor, files) {
            warn!("tearing down half-written bank {bank_id}: {err}");
            let _ = fs::remove_dir_all(&dir);
            return Err(err);
        }
        Ok(())
    }

    /// Read a bank descriptor back, rejecting a store where the descriptor
    /// and the numbered files disagree.
    pub fn server_bank_descriptor(&self, bank_id: &str) -> Result<ServerBankDescriptor, BankError> {
        let dir = self.bank_dir(bank_id);
        let bytes = fs::read(dir.join(DESCRIPTOR_FILE)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BankError::NotFoundLocal(format!("bank {bank_id}"))
            } else {
                io_internal(e)
            }
        })?;
        let descriptor = ServerBankDescriptor::from_bytes(&bytes)?;

        for file_num in 1..=descriptor.nb_files {
            if !dir.join(file_num.to_string()).is_file() {
                return Err(BankError::Malformed(format!(
                    "bank {bank_id} is missing file {file_num}"
                )));
            }
        }
        Ok(descriptor)
    }

    pub fn server_bank_file(&self, bank_id: &str, file_num: u32) -> Result<Vec<u8>, BankError> {
        fs::read(self.bank_dir(bank_id).join(file_num.to_string())).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BankError::NotFoundLocal(format!("file {file_num} of bank {bank_id}"))
            } else {
                io_internal(e)
            }
        })
    }
}

fn write_bank_contents(
    dir: &PathBuf,
    descriptor: &ServerBankDescriptor,
    files: &[Vec<u8>],
) -> Result<(), BankError> {
    if files.len() != descriptor.nb_files as usize {
        return Err(BankError::Internal(
            "received file count disagrees with descriptor".to_string(),
        ));
    }

    fs::write(dir.join(DESCRIPTOR_FILE), descriptor.to_bytes()?).map_err(io_internal)?;
    for (i, file) in files.iter().enumerate() {
        fs::write(dir.join((i + 1).to_string()), file).map_err(io_internal)?;
    }
    Ok(())
}
