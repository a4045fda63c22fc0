//! AES-256-CTR transformers
//!
//! A transformer owns the key, the nonce and a 16-byte counter block:
//! ```text
//! [8 bytes: nonce][8 bytes: block index, big-endian]
//! ```
//! It moves through three states: uninitialized → initialized (`init`) →
//! counter-ready (`reset_counter` / `sync_counter`). Backends differ only in
//! how they produce the keystream and must agree byte-for-byte.
//!
//! A transformer is never shared: every stream, and every partition of a
//! parallel transform, owns its own instance.

pub mod aes_ctr;
pub mod ctr_stream;

pub use aes_ctr::AesCtrTransformer;
pub use ctr_stream::CtrStreamTransformer;

use crate::generator::{BLOCK_SIZE, NONCE_LENGTH};
use crate::keys::EncryptionKey;
use crate::nonce::Nonce;
use salmon_core::{ProviderType, SalmonError, SalmonResult};

/// Counter state shared by every backend.
#[derive(Debug, Clone, Default)]
pub struct CtrState {
    nonce: Option<Nonce>,
    counter: Option<[u8; BLOCK_SIZE]>,
}

impl CtrState {
    pub fn init(&mut self, nonce: &Nonce) {
        self.nonce = Some(*nonce);
        self.counter = None;
    }

    /// Counter := nonce || 0.
    pub fn reset_counter(&mut self) -> SalmonResult<()> {
        let nonce = self
            .nonce
            .ok_or_else(|| SalmonError::Security("no counter, run init first".into()))?;
        let mut counter = [0u8; BLOCK_SIZE];
        counter[..NONCE_LENGTH].copy_from_slice(&nonce);
        self.counter = Some(counter);
        Ok(())
    }

    /// Reset, then advance to the block containing stream byte `position`.
    pub fn sync_counter(&mut self, position: u64) -> SalmonResult<()> {
        self.reset_counter()?;
        self.increase_counter(position / BLOCK_SIZE as u64)
    }

    /// Add `blocks` to the block index in the low 8 bytes.
    ///
    /// A carry into the nonce bytes is refused: one nonce covers at most 2^64 blocks.
    pub fn increase_counter(&mut self, blocks: u64) -> SalmonResult<()> {
        let counter = self
            .counter
            .as_mut()
            .ok_or_else(|| SalmonError::Security("no counter, run init and reset first".into()))?;
        let mut low = [0u8; BLOCK_SIZE - NONCE_LENGTH];
        low.copy_from_slice(&counter[NONCE_LENGTH..]);
        let next = u64::from_be_bytes(low).checked_add(blocks).ok_or_else(|| {
            SalmonError::RangeExceeded("CTR counter exceeded the blocks reserved for this nonce".into())
        })?;
        counter[NONCE_LENGTH..].copy_from_slice(&next.to_be_bytes());
        Ok(())
    }

    pub fn counter(&self) -> SalmonResult<&[u8; BLOCK_SIZE]> {
        self.counter
            .as_ref()
            .ok_or_else(|| SalmonError::Security("no counter, run init and reset first".into()))
    }

    /// Block index currently held in the counter.
    pub fn block(&self) -> u64 {
        self.counter.map_or(0, |counter| {
            let mut low = [0u8; BLOCK_SIZE - NONCE_LENGTH];
            low.copy_from_slice(&counter[NONCE_LENGTH..]);
            u64::from_be_bytes(low)
        })
    }

    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }
}

/// Counter-mode transform over raw buffers.
///
/// `encrypt_block`/`decrypt_block` XOR `src` with the keystream starting at the
/// current counter, write the result to the front of `dst`, and advance the
/// counter by one per (possibly partial) 16-byte block. Callers keep inputs
/// block-aligned except for the final block of a stream.
pub trait CtrTransformer: Send {
    /// Store the key and nonce and prepare the key schedule.
    fn init(&mut self, key: &EncryptionKey, nonce: &Nonce) -> SalmonResult<()>;

    fn encrypt_block(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize>;

    fn decrypt_block(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize>;

    fn state(&self) -> &CtrState;

    fn state_mut(&mut self) -> &mut CtrState;

    fn reset_counter(&mut self) -> SalmonResult<()> {
        self.state_mut().reset_counter()
    }

    fn sync_counter(&mut self, position: u64) -> SalmonResult<()> {
        self.state_mut().sync_counter(position)
    }

    fn increase_counter(&mut self, blocks: u64) -> SalmonResult<()> {
        self.state_mut().increase_counter(blocks)
    }

    fn counter(&self) -> Option<[u8; BLOCK_SIZE]> {
        self.state().counter().ok().copied()
    }

    fn block(&self) -> u64 {
        self.state().block()
    }

    fn nonce(&self) -> Option<&Nonce> {
        self.state().nonce()
    }
}

/// Build an uninitialized transformer for `provider`.
pub fn create_transformer(provider: ProviderType) -> Box<dyn CtrTransformer> {
    match provider {
        ProviderType::Default => Box::new(AesCtrTransformer::new()),
        ProviderType::Ctr => Box::new(CtrStreamTransformer::new()),
    }
}

pub(crate) fn check_output_len(src: &[u8], dst: &[u8]) -> SalmonResult<()> {
    if dst.len() < src.len() {
        return Err(SalmonError::Security(format!(
            "output buffer holds {} bytes but {} are required",
            dst.len(),
            src.len()
        )));
    }
    Ok(())
}
