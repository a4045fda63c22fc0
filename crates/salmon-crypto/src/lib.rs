//! salmon-crypto: seekable, integrity-protected AES-256-CTR streams
//!
//! Pipeline: plaintext → CTR transform (per 16-byte block) → HMAC-SHA256 per chunk → output
//!
//! Physical layout:
//! ```text
//! [16 bytes: header "SLM" | version | chunk size (u32 BE) | nonce (8 bytes)]   (optional)
//! [chunk 0 ciphertext][32-byte HMAC][chunk 1 ciphertext][32-byte HMAC] ...    (integrity on)
//! [ciphertext]                                                               (integrity off)
//! ```
//!
//! Counter block = nonce (8 bytes) || block index (u64 BE). Every position is
//! independently addressable, which is what lets `Encryptor`/`Decryptor`
//! split a buffer across threads and still produce single-threaded output.

pub mod decryptor;
pub mod encryptor;
pub mod generator;
pub mod header;
pub mod integrity;
pub mod keys;
pub mod nonce;
pub mod stream;
pub mod transform;

mod partition;

pub use decryptor::Decryptor;
pub use encryptor::Encryptor;
pub use generator::{
    BLOCK_SIZE, DEFAULT_CHUNK_SIZE, HASH_KEY_LENGTH, HASH_RESULT_LENGTH, HEADER_LENGTH,
    KEY_LENGTH, MAX_CHUNK_SIZE, NONCE_LENGTH,
};
pub use header::Header;
pub use integrity::{actual_size, calculate_hash, Integrity};
pub use keys::{generate_hash_key, generate_key, EncryptionKey, HashKey};
pub use nonce::{generate_nonce, increase_nonce, split_nonce_range, Nonce};
pub use salmon_core::{EncryptionFormat, EncryptionMode, ProviderType, SalmonError, SalmonResult};
pub use stream::{AesStream, StreamOptions, DEFAULT_BUFFER_SIZE};
pub use transform::{create_transformer, CtrTransformer};
