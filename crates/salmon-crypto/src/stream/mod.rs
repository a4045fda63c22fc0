//! Seekable cipher stream
//!
//! `AesStream` exposes the logical (plaintext) content of a physical salmon
//! layout through `std::io::{Read, Write, Seek}`:
//! ```text
//! logical:   [............ plaintext, position 0..len ............]
//! physical:  [header?][chunk 0][hmac 0][chunk 1][hmac 1]...[chunk n][hmac n]
//! ```
//! Reads and writes always cover whole alignment units (one chunk with
//! integrity, one AES block without) and re-sync the counter from the unit's
//! absolute position, so any position can be served independently.
//!
//! Readers verify every chunk before decrypting it. Writers keep a trailing
//! partial unit as plaintext until `flush` (or drop), so the layout never
//! depends on how callers slice their writes.

mod window;

pub(crate) use window::WindowStream;

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::generator::{BLOCK_SIZE, HASH_RESULT_LENGTH, HEADER_LENGTH};
use crate::header::Header;
use crate::integrity::{body_length, body_offset, data_length, Integrity};
use crate::keys::{EncryptionKey, HashKey};
use crate::nonce::Nonce;
use crate::transform::{create_transformer, CtrTransformer};
use salmon_core::{EncryptionFormat, EncryptionMode, ProviderType, SalmonError, SalmonResult};

/// Default amount of data moved through the transformer per call.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

const HASH_LEN: u64 = HASH_RESULT_LENGTH as u64;

/// Length of a seekable stream, leaving its position untouched.
pub(crate) fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if pos != len {
        stream.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

/// Construction options shared by readers and writers.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub format: EncryptionFormat,
    /// Request chunk signing. A non-zero chunk size (given or from a header) forces it on.
    pub integrity: bool,
    pub hash_key: Option<HashKey>,
    /// Chunk size for streams without a header; `None` uses the default when integrity is on.
    pub chunk_size: Option<u32>,
    pub provider: ProviderType,
    pub buffer_size: usize,
    /// A header that was already written (writers) or parsed (readers) by the caller.
    pub header: Option<Header>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: EncryptionFormat::Salmon,
            integrity: false,
            hash_key: None,
            chunk_size: None,
            provider: ProviderType::Default,
            buffer_size: DEFAULT_BUFFER_SIZE,
            header: None,
        }
    }
}

impl StreamOptions {
    pub fn with_format(mut self, format: EncryptionFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_integrity(mut self, hash_key: HashKey, chunk_size: Option<u32>) -> Self {
        self.integrity = true;
        self.hash_key = Some(hash_key);
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }
}

/// Seekable AES-256-CTR stream over a physical salmon layout.
///
/// A writer keeps a trailing partial unit in memory until `flush`, `finish`
/// or drop. Dropping commits it on a best-effort basis and only logs
/// failures, so call `finish` to observe them.
pub struct AesStream<S> {
    /// `None` only after `finish` has handed the stream back.
    base: Option<S>,
    mode: EncryptionMode,
    transformer: Box<dyn CtrTransformer>,
    integrity: Integrity,
    header: Option<Header>,
    header_len: u64,
    position: u64,
    len: u64,
    buffer_size: usize,
    allow_range_write: bool,
    fail_silently: bool,
    /// Plaintext of the unit starting at `pending_start`, shorter than one unit.
    pending: Vec<u8>,
    pending_start: u64,
    /// `pending` holds plaintext not yet written to `base`.
    pending_dirty: bool,
    /// Set on writers; commits `pending` when the stream is dropped.
    drop_commit: Option<fn(&mut AesStream<S>) -> SalmonResult<()>>,
    raw: Vec<u8>,
    scratch: Vec<u8>,
}

fn released() -> io::Error {
    io::Error::other("cipher stream base was already released")
}

impl<S: Read + Seek> AesStream<S> {
    /// Open `base` for decryption.
    ///
    /// With the salmon format the header is parsed from offset 0 and its nonce
    /// and chunk size win over the caller's. Without a header `nonce` is required.
    pub fn reader(
        mut base: S,
        key: &EncryptionKey,
        nonce: Option<&Nonce>,
        options: StreamOptions,
    ) -> SalmonResult<Self> {
        let has_header = options.format.has_header() || options.header.is_some();
        let header = match options.header {
            Some(header) => Some(header),
            None if has_header => Header::read(&mut base)?,
            None => None,
        };

        let nonce = match (&header, nonce) {
            (Some(header), _) => *header.nonce(),
            (None, Some(nonce)) => *nonce,
            (None, None) => {
                return Err(SalmonError::Security(
                    "a nonce is required for a stream without a header".into(),
                ))
            }
        };

        let integrity = match &header {
            Some(h) if h.chunk_size() > 0 => {
                Integrity::new(true, options.hash_key, Some(h.chunk_size()))?
            }
            Some(_) if options.integrity => {
                return Err(SalmonError::Integrity(
                    "integrity requested but the stream header declares unsigned data".into(),
                ))
            }
            Some(_) => Integrity::disabled(),
            None => Integrity::new(options.integrity, options.hash_key, options.chunk_size)?,
        };

        let header_len = if has_header { HEADER_LENGTH as u64 } else { 0 };
        let body = stream_len(&mut base)?.saturating_sub(header_len);
        if integrity.is_enabled() {
            let tail = body % (integrity.chunk_size() as u64 + HASH_LEN);
            if tail > 0 && tail <= HASH_LEN {
                return Err(SalmonError::Integrity(format!(
                    "stream ends with a {tail}-byte fragment that carries no data"
                )));
            }
        }
        let len = data_length(body, integrity.chunk_size());

        Self::build(
            base,
            EncryptionMode::Decrypt,
            key,
            &nonce,
            integrity,
            header,
            header_len,
            len,
            options.provider,
            options.buffer_size,
        )
    }

    /// Decrypt into `buf` starting at the current position.
    fn read_decrypted(&mut self, buf: &mut [u8]) -> SalmonResult<usize> {
        if self.mode != EncryptionMode::Decrypt {
            return Err(SalmonError::Security(
                "stream was opened for encryption and cannot be read".into(),
            ));
        }
        if buf.is_empty() || self.position >= self.len {
            return Ok(0);
        }

        let align = self.align_size() as u64;
        let unit_start = self.position - self.position % align;
        let want_end = self.len.min(self.position + buf.len() as u64);
        let span = (want_end - unit_start).div_ceil(align) * align;
        let cap = (self.buffer_size as u64).max(align);
        let span_end = self.len.min(unit_start + span.min(cap));

        self.load_units(unit_start, span_end)?;

        let skip = (self.position - unit_start) as usize;
        let n = (want_end.min(span_end) - self.position) as usize;
        buf[..n].copy_from_slice(&self.scratch[skip..skip + n]);
        self.position += n as u64;
        Ok(n)
    }

    /// Read, verify and decrypt the units covering `[start, end)` into `scratch`.
    ///
    /// `start` is unit-aligned and `end` is either aligned or the stream end.
    fn load_units(&mut self, start: u64, end: u64) -> SalmonResult<()> {
        let chunk = self.integrity.chunk_size();
        let phys_start = self.header_len + body_length(start, chunk);
        let phys_end = self.header_len + body_length(end, chunk);

        self.raw.resize((phys_end - phys_start) as usize, 0);
        let base = self.base.as_mut().ok_or_else(released)?;
        base.seek(SeekFrom::Start(phys_start))?;
        base.read_exact(&mut self.raw)?;

        self.scratch.resize((end - start) as usize, 0);
        self.transformer.sync_counter(start)?;

        if !self.integrity.is_enabled() {
            self.transformer.decrypt_block(&self.raw, &mut self.scratch)?;
            return Ok(());
        }

        let header_bytes = self.header.as_ref().map(Header::to_bytes);
        let mut out = 0;
        for (i, unit) in self.raw.chunks(chunk as usize + HASH_RESULT_LENGTH).enumerate() {
            let (ciphertext, mac) = unit.split_at(unit.len() - HASH_RESULT_LENGTH);
            let chunk_pos = start + i as u64 * chunk as u64;
            let include = match &header_bytes {
                Some(bytes) if chunk_pos == 0 => Some(&bytes[..]),
                _ => None,
            };
            self.integrity
                .verify(ciphertext, include, mac)
                .map_err(|e| match e {
                    SalmonError::Integrity(_) => SalmonError::Integrity(format!(
                        "chunk at position {chunk_pos} is corrupt or tampered"
                    )),
                    other => other,
                })?;
            self.transformer
                .decrypt_block(ciphertext, &mut self.scratch[out..])?;
            out += ciphertext.len();
        }
        tracing::trace!(start, end, "verified and decrypted units");
        Ok(())
    }
}

impl<S: Write + Seek> AesStream<S> {
    /// Open `base` for encryption.
    ///
    /// With the salmon format the header is written at offset 0 unless
    /// `options.header` says it is already there.
    pub fn writer(
        mut base: S,
        key: &EncryptionKey,
        nonce: &Nonce,
        options: StreamOptions,
    ) -> SalmonResult<Self> {
        let integrity = Integrity::new(options.integrity, options.hash_key, options.chunk_size)?;
        let header = match options.header {
            Some(header) => {
                if header.nonce() != nonce || header.chunk_size() != integrity.chunk_size() {
                    return Err(SalmonError::Security(
                        "supplied header does not match the stream nonce and chunk size".into(),
                    ));
                }
                Some(header)
            }
            None if options.format.has_header() => {
                Some(Header::write(&mut base, nonce, integrity.chunk_size())?)
            }
            None => None,
        };

        let header_len = if header.is_some() { HEADER_LENGTH as u64 } else { 0 };
        let body = stream_len(&mut base)?.saturating_sub(header_len);
        let len = data_length(body, integrity.chunk_size());

        let mut stream = Self::build(
            base,
            EncryptionMode::Encrypt,
            key,
            nonce,
            integrity,
            header,
            header_len,
            len,
            options.provider,
            options.buffer_size,
        )?;
        stream.drop_commit = Some(Self::commit_on_drop);
        Ok(stream)
    }

    /// Commit any pending partial unit, flush, and hand back the base stream.
    pub fn finish(mut self) -> SalmonResult<S> {
        self.commit_pending()?;
        self.drop_commit = None;
        let mut base = self.base.take().ok_or_else(released)?;
        base.flush()?;
        Ok(base)
    }

    fn commit_on_drop(&mut self) -> SalmonResult<()> {
        if !self.pending_dirty {
            return Ok(());
        }
        self.commit_pending()?;
        self.base.as_mut().ok_or_else(released)?.flush()?;
        Ok(())
    }

    fn write_encrypted(&mut self, buf: &[u8]) -> SalmonResult<()> {
        if self.mode != EncryptionMode::Encrypt {
            return Err(SalmonError::Security(
                "stream was opened for decryption and cannot be written".into(),
            ));
        }
        if buf.is_empty() {
            return Ok(());
        }
        if !self.pending.is_empty() && self.pending_end() != self.position {
            self.commit_pending()?;
            self.pending.clear();
            self.pending_dirty = false;
        }
        if self.pending.is_empty() {
            self.pending_start = self.position;
        }

        let align = self.align_size();
        let batch_cap = (self.buffer_size / align).max(1) * align;
        let mut rest = buf;
        while !rest.is_empty() {
            if self.pending.is_empty() && rest.len() >= align {
                let batch = rest.len().min(batch_cap) / align * align;
                let (units, tail) = rest.split_at(batch);
                self.seal(self.position, units)?;
                self.position += batch as u64;
                self.pending_start = self.position;
                rest = tail;
                continue;
            }

            let take = (align - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            self.pending_dirty = true;
            self.position += take as u64;
            rest = &rest[take..];
            if self.pending.len() == align {
                let unit = std::mem::take(&mut self.pending);
                let sealed = self.seal(self.pending_start, &unit);
                self.pending = unit;
                self.pending.clear();
                self.pending_dirty = false;
                sealed?;
                self.pending_start = self.position;
            }
        }
        Ok(())
    }

    /// Encrypt and store a partial trailing unit, keeping its plaintext for extension.
    fn commit_pending(&mut self) -> SalmonResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.integrity.is_enabled() && self.pending_end() < self.len {
            return Err(SalmonError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "a partial chunk can only be written at the end of the stream",
            )));
        }
        let unit = std::mem::take(&mut self.pending);
        let sealed = self.seal(self.pending_start, &unit);
        self.pending = unit;
        sealed?;
        self.pending_dirty = false;
        Ok(())
    }

    /// Encrypt `plain` as the data starting at aligned position `start` and
    /// write it, with chunk signatures, to the base stream.
    fn seal(&mut self, start: u64, plain: &[u8]) -> SalmonResult<()> {
        let chunk = self.integrity.chunk_size();
        self.transformer.sync_counter(start)?;
        self.scratch.resize(plain.len(), 0);
        self.transformer.encrypt_block(plain, &mut self.scratch)?;
        let base = self.base.as_mut().ok_or_else(released)?;
        base.seek(SeekFrom::Start(self.header_len + body_offset(start, chunk)))?;

        if self.integrity.is_enabled() {
            let header_bytes = self.header.as_ref().map(Header::to_bytes);
            for (i, ciphertext) in self.scratch.chunks(chunk as usize).enumerate() {
                let include = match &header_bytes {
                    Some(bytes) if start + i as u64 * chunk as u64 == 0 => Some(&bytes[..]),
                    _ => None,
                };
                let mac = self.integrity.sign(ciphertext, include)?;
                base.write_all(ciphertext)?;
                base.write_all(&mac)?;
            }
        } else {
            base.write_all(&self.scratch)?;
        }

        self.len = self.len.max(start + plain.len() as u64);
        tracing::trace!(start, len = plain.len(), "sealed units");
        Ok(())
    }
}

impl<S> AesStream<S> {
    #[allow(clippy::too_many_arguments)]
    fn build(
        base: S,
        mode: EncryptionMode,
        key: &EncryptionKey,
        nonce: &Nonce,
        integrity: Integrity,
        header: Option<Header>,
        header_len: u64,
        len: u64,
        provider: ProviderType,
        buffer_size: usize,
    ) -> SalmonResult<Self> {
        let mut transformer = create_transformer(provider);
        transformer.init(key, nonce)?;
        transformer.reset_counter()?;

        let mut stream = Self {
            base: Some(base),
            mode,
            transformer,
            integrity,
            header,
            header_len,
            position: 0,
            len,
            buffer_size: DEFAULT_BUFFER_SIZE,
            allow_range_write: false,
            fail_silently: false,
            pending: Vec::new(),
            pending_start: 0,
            pending_dirty: false,
            drop_commit: None,
            raw: Vec::new(),
            scratch: Vec::new(),
        };
        stream.set_buffer_size(buffer_size);
        Ok(stream)
    }

    fn pending_end(&self) -> u64 {
        self.pending_start + self.pending.len() as u64
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Logical (plaintext) length.
    pub fn len(&self) -> u64 {
        if self.pending.is_empty() {
            self.len
        } else {
            self.len.max(self.pending_end())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Chunk size in bytes, 0 when integrity is off.
    pub fn chunk_size(&self) -> u32 {
        self.integrity.chunk_size()
    }

    /// Unit every read and write is processed in: the chunk size, or one AES block.
    pub fn align_size(&self) -> usize {
        if self.integrity.is_enabled() {
            self.integrity.chunk_size() as usize
        } else {
            BLOCK_SIZE
        }
    }

    pub fn is_integrity_enabled(&self) -> bool {
        self.integrity.is_enabled()
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn has_header(&self) -> bool {
        self.header_len > 0
    }

    pub fn nonce(&self) -> Option<&Nonce> {
        self.transformer.nonce()
    }

    /// Counter block as left by the last transform.
    pub fn counter(&self) -> Option<[u8; BLOCK_SIZE]> {
        self.transformer.counter()
    }

    pub fn block(&self) -> u64 {
        self.transformer.block()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Set the transform batch size, rounded down to whole units (at least one).
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        let align = self.align_size();
        self.buffer_size = (buffer_size / align).max(1) * align;
    }

    /// Allow a writer to seek away from position 0.
    ///
    /// Rewriting a range re-uses the keystream of that range, so only enable
    /// this for data that is being rewritten in full or partitioned writes.
    pub fn set_allow_range_write(&mut self, allow: bool) {
        self.allow_range_write = allow;
    }

    /// Report end-of-stream instead of an error when a chunk fails verification.
    pub fn set_fail_silently(&mut self, fail_silently: bool) {
        self.fail_silently = fail_silently;
    }
}

impl<S> Drop for AesStream<S> {
    fn drop(&mut self) {
        let Some(commit) = self.drop_commit.take() else {
            return;
        };
        if let Err(e) = commit(self) {
            tracing::warn!(
                position = self.pending_start,
                pending = self.pending.len(),
                "writer dropped with an uncommitted partial unit: {e}"
            );
        }
    }
}

impl<S: Read + Seek> Read for AesStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_decrypted(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.is_integrity() && self.fail_silently => {
                tracing::warn!(position = self.position, "integrity check failed, ending stream: {e}");
                self.position = self.len;
                Ok(0)
            }
            Err(e) => {
                if e.is_integrity() {
                    tracing::warn!(position = self.position, "integrity check failed: {e}");
                }
                Err(e.into_io())
            }
        }
    }
}

impl<S: Write + Seek> Write for AesStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_encrypted(buf).map_err(SalmonError::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit_pending().map_err(SalmonError::into_io)?;
        self.base.as_mut().ok_or_else(released)?.flush()
    }
}

impl<S: Seek> Seek for AesStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position")
        })?;

        if self.mode == EncryptionMode::Encrypt && target != self.position {
            if target != 0 && !self.allow_range_write {
                return Err(SalmonError::Security(
                    "range writes are not allowed on this stream".into(),
                )
                .into_io());
            }
            if target % self.align_size() as u64 != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "writer position {target} is not aligned to {} bytes",
                        self.align_size()
                    ),
                ));
            }
            if target > self.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("writer position {target} is past the end of the stream"),
                ));
            }
        }

        self.position = target;
        Ok(target)
    }
}
