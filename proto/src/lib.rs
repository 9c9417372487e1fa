pub mod config;
pub mod descriptor;
pub mod error;
pub mod messages;
pub mod wire;

pub use error::BankError;

/// Timeout for the single round-trip AddNode exchange, in seconds.
pub const ADDNODE_TIMEOUT_SECS: u64 = 5;

/// Timeout for upload and download handshakes, measured from stream open to
/// stream close, in seconds.
pub const BANK_TIMEOUT_SECS: u64 = 30;
