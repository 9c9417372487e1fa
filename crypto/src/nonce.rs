use rand::rngs::OsRng;
use rand::RngCore;

/// Length of a challenge nonce on the wire.
pub const NONCE_LEN: usize = 12;

/// Fresh 12-byte nonce from the OS RNG, one per handshake.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    random_bytes::<NONCE_LEN>()
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}
