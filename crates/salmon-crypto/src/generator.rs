//! Format constants and secure randomness

use rand::rngs::OsRng;
use rand::RngCore;

pub use salmon_core::config::{BLOCK_SIZE, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Magic bytes opening every header
pub const MAGIC_BYTES: &[u8; MAGIC_LENGTH] = b"SLM";

/// Format version written into new headers
pub const VERSION: u8 = 2;

pub const MAGIC_LENGTH: usize = 3;
pub const VERSION_LENGTH: usize = 1;
pub const CHUNK_SIZE_LENGTH: usize = 4;

/// Nonce length (upper half of the counter block)
pub const NONCE_LENGTH: usize = 8;

/// AES-256 key length
pub const KEY_LENGTH: usize = 32;

/// HMAC-SHA256 key length
pub const HASH_KEY_LENGTH: usize = 32;

/// HMAC-SHA256 output length
pub const HASH_RESULT_LENGTH: usize = 32;

/// Total header length: magic + version + chunk size + nonce
pub const HEADER_LENGTH: usize = MAGIC_LENGTH + VERSION_LENGTH + CHUNK_SIZE_LENGTH + NONCE_LENGTH;

/// Fill `buf` from the operating system CSPRNG.
pub fn fill_secure_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// Return `len` bytes from the operating system CSPRNG.
pub fn secure_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    fill_secure_random(&mut bytes);
    bytes
}
