//! Whole-buffer parallel decryption.
//!
//! The header is parsed once, one probe stream validates the layout and
//! yields the plaintext length, then each partition decrypts its logical
//! range through its own reader into a disjoint slice of the output.
//! Every chunk is verified before its plaintext is produced; a failure in any
//! partition fails the whole call after all partitions have finished.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ops::Range;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::generator::BLOCK_SIZE;
use crate::header::Header;
use crate::keys::{EncryptionKey, HashKey};
use crate::nonce::Nonce;
use crate::partition;
use crate::stream::{AesStream, StreamOptions, DEFAULT_BUFFER_SIZE};
use salmon_core::{EncryptionFormat, ProviderType, SalmonResult};

/// Decrypts byte buffers on a fixed pool of worker threads.
pub struct Decryptor {
    pool: ThreadPool,
    threads: usize,
    buffer_size: usize,
    provider: ProviderType,
}

impl Decryptor {
    /// Create a decryptor with its own pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> SalmonResult<Self> {
        let threads = threads.max(1);
        Ok(Self {
            pool: partition::build_pool(threads, "decryptor")?,
            threads,
            buffer_size: DEFAULT_BUFFER_SIZE,
            provider: ProviderType::Default,
        })
    }

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

    /// Decrypt `data` in full.
    ///
    /// With the salmon format the nonce and chunk size come from the header;
    /// otherwise `nonce` is required and `chunk_size` must match the one used
    /// to encrypt.
    #[allow(clippy::too_many_arguments)]
    pub fn decrypt(
        &self,
        data: &[u8],
        key: &EncryptionKey,
        nonce: Option<&Nonce>,
        format: EncryptionFormat,
        integrity: bool,
        hash_key: Option<&HashKey>,
        chunk_size: Option<u32>,
    ) -> SalmonResult<Vec<u8>> {
        let header = if format.has_header() {
            match Header::read(&mut Cursor::new(data))? {
                Some(header) => Some(header),
                None => return Ok(Vec::new()),
            }
        } else {
            None
        };

        let options = StreamOptions {
            format,
            integrity,
            hash_key: hash_key.cloned(),
            chunk_size,
            provider: self.provider,
            buffer_size: self.buffer_size,
            header,
        };
        let probe = AesStream::reader(Cursor::new(data), key, nonce, options.clone())?;
        let len = probe.len();
        let min_part = if probe.is_integrity_enabled() {
            probe.chunk_size() as u64
        } else {
            BLOCK_SIZE as u64
        };
        drop(probe);

        let parts = partition::plan(len, self.threads, min_part);
        tracing::debug!(len, partitions = parts.len(), "decrypting buffer");

        let mut out = vec![0u8; len as usize];
        let mut jobs = Vec::with_capacity(parts.len());
        let mut rest = &mut out[..];
        for part in parts {
            let (slice, tail) = std::mem::take(&mut rest).split_at_mut((part.end - part.start) as usize);
            rest = tail;
            jobs.push((part, slice));
        }

        let results: Vec<SalmonResult<()>> = self.pool.install(|| {
            jobs.into_par_iter()
                .map(|(part, slice)| decrypt_part(data, slice, part, key, nonce, options.clone()))
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

fn decrypt_part(
    data: &[u8],
    out: &mut [u8],
    part: Range<u64>,
    key: &EncryptionKey,
    nonce: Option<&Nonce>,
    options: StreamOptions,
) -> SalmonResult<()> {
    let mut stream = AesStream::reader(Cursor::new(data), key, nonce, options)?;
    stream.seek(SeekFrom::Start(part.start))?;
    stream.read_exact(out)?;
    Ok(())
}
