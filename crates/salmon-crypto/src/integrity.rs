//! Chunked HMAC-SHA256 integrity
//!
//! With integrity on, the body is split into `chunk_size` runs of ciphertext,
//! each followed by its 32-byte signature:
//! ```text
//! [chunk 0][hmac 0][chunk 1][hmac 1] ... [last chunk, may be shorter][hmac n]
//! ```
//! The first chunk's signature also covers the 16 header bytes when the
//! stream has a header, binding the nonce and chunk size to the data.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::generator::{
    BLOCK_SIZE, DEFAULT_CHUNK_SIZE, HASH_RESULT_LENGTH, HEADER_LENGTH, MAX_CHUNK_SIZE,
};
use crate::keys::HashKey;
use salmon_core::{EncryptionMode, SalmonError, SalmonResult};

type HmacSha256 = Hmac<Sha256>;

const HASH_LEN: u64 = HASH_RESULT_LENGTH as u64;

fn keyed_mac(key: &HashKey, include_data: Option<&[u8]>, data: &[u8]) -> SalmonResult<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| SalmonError::Security(format!("invalid hash key: {e}")))?;
    if let Some(extra) = include_data {
        mac.update(extra);
    }
    mac.update(data);
    Ok(mac)
}

/// HMAC-SHA256 over `include_data || data`.
pub fn calculate_hash(
    key: &HashKey,
    data: &[u8],
    include_data: Option<&[u8]>,
) -> SalmonResult<[u8; HASH_RESULT_LENGTH]> {
    Ok(keyed_mac(key, include_data, data)?.finalize().into_bytes().into())
}

/// Physical body length (ciphertext plus signatures) for `data_len` bytes of data.
pub fn body_length(data_len: u64, chunk_size: u32) -> u64 {
    if chunk_size == 0 {
        return data_len;
    }
    data_len + data_len.div_ceil(chunk_size as u64) * HASH_LEN
}

/// Data length carried by a physical body of `body_len` bytes.
///
/// A trailing fragment no longer than a signature carries no data.
pub fn data_length(body_len: u64, chunk_size: u32) -> u64 {
    if chunk_size == 0 {
        return body_len;
    }
    let unit = chunk_size as u64 + HASH_LEN;
    let full = body_len / unit;
    let rem = body_len % unit;
    full * chunk_size as u64 + rem.saturating_sub(HASH_LEN)
}

/// Offset inside the body where the data byte at `position` is stored.
pub fn body_offset(position: u64, chunk_size: u32) -> u64 {
    if chunk_size == 0 {
        return position;
    }
    let chunk = chunk_size as u64;
    (position / chunk) * (chunk + HASH_LEN) + position % chunk
}

/// Total bytes taken by signatures when transforming `length` bytes.
///
/// For `Encrypt` the length is plaintext, for `Decrypt` it is the physical body.
pub fn total_hash_data_length(mode: EncryptionMode, length: u64, chunk_size: u32) -> u64 {
    match mode {
        EncryptionMode::Encrypt => body_length(length, chunk_size) - length,
        EncryptionMode::Decrypt => length - data_length(length, chunk_size),
    }
}

/// Exact output length of a full transform, computed without transforming.
///
/// `chunk_size == 0` means integrity is off. Used to size output buffers once.
pub fn actual_size(mode: EncryptionMode, length: u64, has_header: bool, chunk_size: u32) -> u64 {
    let header = if has_header { HEADER_LENGTH as u64 } else { 0 };
    match mode {
        EncryptionMode::Encrypt => header + body_length(length, chunk_size),
        EncryptionMode::Decrypt => data_length(length.saturating_sub(header), chunk_size),
    }
}

/// Per-stream integrity settings: whether chunks are signed, their size, and the key.
#[derive(Clone)]
pub struct Integrity {
    chunk_size: u32,
    key: Option<HashKey>,
}

impl Integrity {
    /// Integrity is on when requested or when `chunk_size` is non-zero.
    ///
    /// Requested integrity without a chunk size uses [`DEFAULT_CHUNK_SIZE`].
    pub fn new(enabled: bool, key: Option<HashKey>, chunk_size: Option<u32>) -> SalmonResult<Self> {
        let chunk_size = chunk_size.unwrap_or(0);
        if chunk_size % BLOCK_SIZE as u32 != 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(SalmonError::Integrity(format!(
                "invalid chunk size {chunk_size}: use 0 for the default or a multiple of {BLOCK_SIZE} up to {MAX_CHUNK_SIZE}"
            )));
        }
        let enabled = enabled || chunk_size > 0;
        if !enabled {
            return Ok(Self {
                chunk_size: 0,
                key: None,
            });
        }
        let Some(key) = key else {
            return Err(SalmonError::Security(
                "a hash key is required when integrity is enabled".into(),
            ));
        };
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            chunk_size,
            key: Some(key),
        })
    }

    pub fn disabled() -> Self {
        Self {
            chunk_size: 0,
            key: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.chunk_size > 0
    }

    /// Chunk size in bytes, 0 when integrity is off.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn key(&self) -> Option<&HashKey> {
        self.key.as_ref()
    }

    /// Bytes taken by signatures within a physical body of `body_len` bytes.
    pub fn hash_data_length(&self, body_len: u64) -> u64 {
        total_hash_data_length(EncryptionMode::Decrypt, body_len, self.chunk_size)
    }

    /// Sign one chunk of ciphertext.
    pub fn sign(&self, chunk: &[u8], include_data: Option<&[u8]>) -> SalmonResult<[u8; HASH_RESULT_LENGTH]> {
        let key = self.require_key()?;
        calculate_hash(key, chunk, include_data)
    }

    /// Check one chunk of ciphertext against its stored signature in constant time.
    pub fn verify(&self, chunk: &[u8], include_data: Option<&[u8]>, expected: &[u8]) -> SalmonResult<()> {
        let key = self.require_key()?;
        keyed_mac(key, include_data, chunk)?
            .verify_slice(expected)
            .map_err(|_| SalmonError::Integrity("data corrupt or tampered".into()))
    }

    fn require_key(&self) -> SalmonResult<&HashKey> {
        self.key
            .as_ref()
            .ok_or_else(|| SalmonError::Security("integrity is not enabled".into()))
    }
}

impl std::fmt::Debug for Integrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrity")
            .field("chunk_size", &self.chunk_size)
            .field("key", &self.key)
            .finish()
    }
}
