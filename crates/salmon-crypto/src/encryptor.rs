//! Whole-buffer parallel encryption.
//!
//! The output is sized once with [`actual_size`], the header (if any) is
//! written up front, and the body is split into disjoint windows, one per
//! partition. Each partition runs its own writer stream positioned at its
//! absolute offset, so the result is identical for every thread count.

use std::io::{Seek, SeekFrom, Write};
use std::ops::Range;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::generator::{BLOCK_SIZE, HEADER_LENGTH};
use crate::header::Header;
use crate::integrity::{actual_size, body_length, Integrity};
use crate::keys::{EncryptionKey, HashKey};
use crate::nonce::Nonce;
use crate::partition;
use crate::stream::{AesStream, StreamOptions, WindowStream, DEFAULT_BUFFER_SIZE};
use salmon_core::{EncryptionFormat, EncryptionMode, ProviderType, SalmonResult};

/// Encrypts byte buffers on a fixed pool of worker threads.
pub struct Encryptor {
    pool: ThreadPool,
    threads: usize,
    buffer_size: usize,
    provider: ProviderType,
}

impl Encryptor {
    /// Create an encryptor with its own pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> SalmonResult<Self> {
        let threads = threads.max(1);
        Ok(Self {
            pool: partition::build_pool(threads, "encryptor")?,
            threads,
            buffer_size: DEFAULT_BUFFER_SIZE,
            provider: ProviderType::Default,
        })
    }

    /// Batch size used by every partition stream.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Encrypt `data` in full.
    ///
    /// A non-zero `chunk_size` turns integrity on even when `integrity` is false;
    /// integrity requires `hash_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn encrypt(
        &self,
        data: &[u8],
        key: &EncryptionKey,
        nonce: &Nonce,
        format: EncryptionFormat,
        integrity: bool,
        hash_key: Option<&HashKey>,
        chunk_size: Option<u32>,
    ) -> SalmonResult<Vec<u8>> {
        let integrity = Integrity::new(integrity, hash_key.cloned(), chunk_size)?;
        let chunk_size = integrity.chunk_size();
        let has_header = format.has_header();
        let header_len = if has_header { HEADER_LENGTH } else { 0 };

        let out_len = actual_size(EncryptionMode::Encrypt, data.len() as u64, has_header, chunk_size);
        let mut out = vec![0u8; out_len as usize];
        let header = has_header.then(|| Header::new(*nonce, chunk_size));
        if let Some(header) = &header {
            out[..HEADER_LENGTH].copy_from_slice(&header.to_bytes());
        }

        let min_part = if integrity.is_enabled() {
            chunk_size as u64
        } else {
            BLOCK_SIZE as u64
        };
        let parts = partition::plan(data.len() as u64, self.threads, min_part);
        tracing::debug!(
            len = data.len(),
            partitions = parts.len(),
            chunk_size,
            "encrypting buffer"
        );

        let options = StreamOptions {
            format,
            integrity: integrity.is_enabled(),
            hash_key: integrity.key().cloned(),
            chunk_size: Some(chunk_size),
            provider: self.provider,
            buffer_size: self.buffer_size,
            header,
        };

        let mut jobs = Vec::with_capacity(parts.len());
        let mut rest = &mut out[header_len..];
        for part in parts {
            let phys_start = header_len as u64 + body_length(part.start, chunk_size);
            let phys_end = header_len as u64 + body_length(part.end, chunk_size);
            let (window, tail) = std::mem::take(&mut rest).split_at_mut((phys_end - phys_start) as usize);
            rest = tail;
            jobs.push((part, WindowStream::new(window, phys_start)));
        }

        let results: Vec<SalmonResult<()>> = self.pool.install(|| {
            jobs.into_par_iter()
                .map(|(part, window)| encrypt_part(window, data, part, key, nonce, options.clone()))
                .collect()
        });
        partition::first_error(results)?;
        Ok(out)
    }

    /// Shut down the worker pool.
    pub fn close(self) {
        drop(self);
    }
}

fn encrypt_part(
    window: WindowStream<'_>,
    data: &[u8],
    part: Range<u64>,
    key: &EncryptionKey,
    nonce: &Nonce,
    options: StreamOptions,
) -> SalmonResult<()> {
    let mut stream = AesStream::writer(window, key, nonce, options)?;
    stream.set_allow_range_write(true);
    stream.seek(SeekFrom::Start(part.start))?;
    stream.write_all(&data[part.start as usize..part.end as usize])?;
    stream.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> EncryptionKey {
        EncryptionKey::from_bytes([5; 32])
    }

    #[test]
    fn output_has_predicted_size() {
        let enc = Encryptor::new(3).unwrap();
        let hash_key = HashKey::from_bytes([6; 32]);
        let data = vec![9u8; 5000];
        let out = enc
            .encrypt(&data, &key(), &[1; 8], EncryptionFormat::Salmon, true, Some(&hash_key), Some(1024))
            .unwrap();
        assert_eq!(out.len() as u64, actual_size(EncryptionMode::Encrypt, 5000, true, 1024));
        assert_eq!(&out[..3], b"SLM");
    }

    #[test]
    fn integrity_without_hash_key_fails() {
        let enc = Encryptor::new(1).unwrap();
        let err = enc
            .encrypt(b"abc", &key(), &[1; 8], EncryptionFormat::Salmon, true, None, None)
            .unwrap_err();
        assert!(matches!(err, salmon_core::SalmonError::Security(_)));
    }

    #[test]
    fn generic_format_has_no_header() {
        let enc = Encryptor::new(2).unwrap().with_buffer_size(32);
        let out = enc
            .encrypt(&[0u8; 100], &key(), &[1; 8], EncryptionFormat::Generic, false, None, None)
            .unwrap();
        assert_eq!(out.len(), 100);
        enc.close();
    }

    #[test]
    fn zero_threads_means_one() {
        assert_eq!(Encryptor::new(0).unwrap().threads(), 1);
    }
}
