//! Key material: AES-256 encryption keys and HMAC-SHA256 hash keys

use zeroize::Zeroize;

use crate::generator::{fill_secure_random, HASH_KEY_LENGTH, KEY_LENGTH};
use salmon_core::{SalmonError, SalmonResult};

/// A 256-bit AES key. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Copy a key out of a slice, failing unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> SalmonResult<Self> {
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            SalmonError::Security(format!(
                "key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.bytes
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit HMAC-SHA256 key used to sign chunks. Zeroized on drop.
#[derive(Clone)]
pub struct HashKey {
    bytes: [u8; HASH_KEY_LENGTH],
}

impl HashKey {
    pub fn from_bytes(bytes: [u8; HASH_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> SalmonResult<Self> {
        let bytes: [u8; HASH_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            SalmonError::Security(format!(
                "hash key must be {HASH_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; HASH_KEY_LENGTH] {
        &self.bytes
    }
}

impl Drop for HashKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random AES-256 key.
pub fn generate_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_LENGTH];
    fill_secure_random(&mut bytes);
    EncryptionKey::from_bytes(bytes)
}

/// Generate a random HMAC key.
pub fn generate_hash_key() -> HashKey {
    let mut bytes = [0u8; HASH_KEY_LENGTH];
    fill_secure_random(&mut bytes);
    HashKey::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let k1 = generate_key();
        let k2 = generate_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(EncryptionKey::from_slice(&[7u8; 32]).is_ok());
        assert!(matches!(
            EncryptionKey::from_slice(&[7u8; 16]),
            Err(SalmonError::Security(_))
        ));
        assert!(HashKey::from_slice(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let key = EncryptionKey::from_bytes([0xAB; KEY_LENGTH]);
        let shown = format!("{key:?} {:?}", generate_hash_key());
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains("171"), "key bytes must not leak into Debug output");
    }
}
