use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use filebank_crypto::nonce::random_nonce;
use filebank_proto::{BankError, BANK_TIMEOUT_SECS};

pub const SESSION_TTL: Duration = Duration::from_secs(BANK_TIMEOUT_SECS);

/// Where one protocol exchange currently stands. Each session is keyed by the
/// challenge nonce issued when it was opened, so presenting the right nonce
/// and being in the right phase are checked by the same lookup.
#[derive(Debug)]
pub enum SessionState {
    UploadAwaitInit,
    UploadReceiving {
        pub_key_pem: String,
        nb_files: u32,
        next_seq: i32,
        files: Vec<Vec<u8>>,
    },
    DownloadAwaitRequest,
}

#[derive(Debug)]
pub struct Session {
    pub state: SessionState,
    opened: Instant,
}

impl Session {
    fn new(state: SessionState) -> Self {
        Self {
            state,
            opened: Instant::now(),
        }
    }

    pub fn expired(&self) -> bool {
        self.opened.elapsed() >= SESSION_TTL
    }

    /// Move the exchange to its next phase, keeping the original deadline.
    pub fn advance(self, state: SessionState) -> Session {
        Session {
            state,
            opened: self.opened,
        }
    }
}

/// In-flight protocol exchanges. The lock is only ever held for map
/// operations; no I/O happens under it.
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: Mutex<HashMap<[u8; 12], Session>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return the fresh challenge nonce that keys it.
    pub fn open(&self, state: SessionState) -> [u8; 12] {
        let nonce = random_nonce();
        self.sessions
            .lock()
            .unwrap()
            .insert(nonce, Session::new(state));
        nonce
    }

    /// Remove and return the session for a nonce. The caller re-inserts it
    /// with [`SessionPool::restore`] only when its step succeeds, so any
    /// failure aborts the whole exchange.
    pub fn take(&self, nonce: &[u8; 12]) -> Result<Session, BankError> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .remove(nonce)
            .ok_or(BankError::BadNonce)?;
        if session.expired() {
            return Err(BankError::Transport("session timed out".to_string()));
        }
        Ok(session)
    }

    pub fn restore(&self, nonce: [u8; 12], session: Session) {
        self.sessions.lock().unwrap().insert(nonce, session);
    }

    /// Drop sessions past their deadline.
    pub fn sweep(&self) {
        self.sessions.lock().unwrap().retain(|_, s| !s.expired());
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
