//! Default backend: AES-256 block cipher driven over a batch of counter blocks.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256, Block};

use super::{check_output_len, CtrState, CtrTransformer};
use crate::generator::BLOCK_SIZE;
use crate::keys::EncryptionKey;
use crate::nonce::Nonce;
use salmon_core::{SalmonError, SalmonResult};

/// Counter blocks encrypted per call into the block cipher.
const BATCH_BLOCKS: usize = 64;

#[derive(Default)]
pub struct AesCtrTransformer {
    cipher: Option<Aes256>,
    state: CtrState,
}

impl AesCtrTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    fn transform(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize> {
        check_output_len(src, dst)?;
        let cipher = self
            .cipher
            .as_ref()
            .ok_or_else(|| SalmonError::Security("transformer not initialized".into()))?;
        self.state.counter()?;

        let mut keystream = [Block::default(); BATCH_BLOCKS];
        let dst = &mut dst[..src.len()];
        for (src_batch, dst_batch) in src
            .chunks(BATCH_BLOCKS * BLOCK_SIZE)
            .zip(dst.chunks_mut(BATCH_BLOCKS * BLOCK_SIZE))
        {
            let blocks = src_batch.len().div_ceil(BLOCK_SIZE);
            for ks in keystream[..blocks].iter_mut() {
                ks.copy_from_slice(self.state.counter()?);
                self.state.increase_counter(1)?;
            }
            cipher.encrypt_blocks(&mut keystream[..blocks]);
            for (i, (s, d)) in src_batch.iter().zip(dst_batch.iter_mut()).enumerate() {
                *d = s ^ keystream[i / BLOCK_SIZE][i % BLOCK_SIZE];
            }
        }
        Ok(src.len())
    }
}

impl CtrTransformer for AesCtrTransformer {
    fn init(&mut self, key: &EncryptionKey, nonce: &Nonce) -> SalmonResult<()> {
        self.cipher = Some(Aes256::new(key.as_bytes().into()));
        self.state.init(nonce);
        Ok(())
    }

    fn encrypt_block(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize> {
        self.transform(src, dst)
    }

    fn decrypt_block(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize> {
        self.transform(src, dst)
    }

    fn state(&self) -> &CtrState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CtrState {
        &mut self.state
    }
}
