use filebank_crypto::ed25519::BankKeypair;
use filebank_proto::BankError;
use filebank_storage::BankHome;

use crate::session::SessionPool;

/// Everything a request handler needs, built once at startup and read-only
/// afterwards (apart from the session pool, which manages its own locking).
/// Handlers receive it as an `Arc` instead of reaching for process globals.
pub struct ServerContext {
    home: BankHome,
    keypair: BankKeypair,
    pub_key_pem: String,
    sessions: SessionPool,
}

impl ServerContext {
    pub fn new(home: BankHome, keypair: BankKeypair) -> Result<Self, BankError> {
        let pub_key_pem = keypair.public_key_pem()?;
        Ok(Self {
            home,
            keypair,
            pub_key_pem,
            sessions: SessionPool::new(),
        })
    }

    pub fn home(&self) -> &BankHome {
        &self.home
    }

    /// PEM encoding of the server's long-lived public key.
    pub fn pub_key_pem(&self) -> &str {
        &self.pub_key_pem
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    /// Sign with the server's long-lived key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.keypair.sign(message)
    }
}
