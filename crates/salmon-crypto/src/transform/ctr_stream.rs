//! `ctr` crate backend: a fresh `Ctr64BE<Aes256>` keyed at the current counter per call.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use super::{check_output_len, CtrState, CtrTransformer};
use crate::generator::BLOCK_SIZE;
use crate::keys::EncryptionKey;
use crate::nonce::Nonce;
use salmon_core::{SalmonError, SalmonResult};

type Aes256Ctr64BE = ctr::Ctr64BE<Aes256>;

#[derive(Default)]
pub struct CtrStreamTransformer {
    key: Option<EncryptionKey>,
    state: CtrState,
}

impl CtrStreamTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    fn transform(&mut self, src: &[u8], dst: &mut [u8]) -> SalmonResult<usize> {
        check_output_len(src, dst)?;
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| SalmonError::Security("transformer not initialized".into()))?;
        let iv = *self.state.counter()?;
        // range check before producing any keystream
        self.state
            .increase_counter(src.len().div_ceil(BLOCK_SIZE) as u64)?;

        let mut cipher = Aes256Ctr64BE::new(key.as_bytes().into(), (&iv).into());
        cipher
            .apply_keystream_b2b(src, &mut dst[..src.len()])
            .map_err(|e| SalmonError::RangeExceeded(format!("keystream: {e}")))?;
        Ok(src.len())
    }
}

impl CtrTransformer for CtrStreamTransformer {
    fn init(&mut self, key: &EncryptionKey, nonce: &Nonce) -> SalmonResult<()> {
        self.key = Some(key.clone());
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
