//! API key generation.
use rand::RngCore;
use rand::rngs::OsRng;

/// Random bytes per generated key; hex encoding doubles the length.
pub const KEY_BYTES: usize = 20;

/// Generate a new API key: 20 bytes from the OS CSPRNG, hex encoded.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
