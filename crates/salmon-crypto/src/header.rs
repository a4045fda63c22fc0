//! 16-byte stream header codec
//!
//! Wire format (big-endian):
//! ```text
//! [3 bytes: "SLM"][1 byte: version][4 bytes: chunk size, 0 = no integrity][8 bytes: nonce]
//! ```
//!
//! The header always lives at offset 0 of the backing stream. Reading or
//! writing it restores the caller's stream position afterwards.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::generator::{
    CHUNK_SIZE_LENGTH, HEADER_LENGTH, MAGIC_BYTES, MAGIC_LENGTH, NONCE_LENGTH, VERSION,
    VERSION_LENGTH,
};
use crate::nonce::Nonce;
use crate::stream::stream_len;
use salmon_core::{SalmonError, SalmonResult};

const VERSION_OFFSET: usize = MAGIC_LENGTH;
const CHUNK_SIZE_OFFSET: usize = VERSION_OFFSET + VERSION_LENGTH;
const NONCE_OFFSET: usize = CHUNK_SIZE_OFFSET + CHUNK_SIZE_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    version: u8,
    chunk_size: u32,
    nonce: Nonce,
}

impl Header {
    /// A header for the current format version.
    pub fn new(nonce: Nonce, chunk_size: u32) -> Self {
        Self {
            version: VERSION,
            chunk_size,
            nonce,
        }
    }

    /// Decode a header, rejecting anything that does not start with the magic bytes.
    pub fn from_bytes(data: &[u8; HEADER_LENGTH]) -> SalmonResult<Self> {
        if &data[..MAGIC_LENGTH] != MAGIC_BYTES {
            return Err(SalmonError::Security(
                "stream does not start with a salmon header".into(),
            ));
        }
        let mut chunk_size = [0u8; CHUNK_SIZE_LENGTH];
        chunk_size.copy_from_slice(&data[CHUNK_SIZE_OFFSET..NONCE_OFFSET]);
        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(&data[NONCE_OFFSET..HEADER_LENGTH]);
        Ok(Self {
            version: data[VERSION_OFFSET],
            chunk_size: u32::from_be_bytes(chunk_size),
            nonce,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut data = [0u8; HEADER_LENGTH];
        data[..MAGIC_LENGTH].copy_from_slice(MAGIC_BYTES);
        data[VERSION_OFFSET] = self.version;
        data[CHUNK_SIZE_OFFSET..NONCE_OFFSET].copy_from_slice(&self.chunk_size.to_be_bytes());
        data[NONCE_OFFSET..].copy_from_slice(&self.nonce);
        data
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Chunk size in bytes; a non-zero value means every chunk is signed.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Serialize a header at offset 0 of `stream` and return it.
    pub fn write<S: Write + Seek>(
        stream: &mut S,
        nonce: &Nonce,
        chunk_size: u32,
    ) -> SalmonResult<Header> {
        let header = Header::new(*nonce, chunk_size);
        let pos = stream.stream_position()?;
        stream.seek(SeekFrom::Start(0))?;
        stream.write_all(&header.to_bytes())?;
        stream.flush()?;
        stream.seek(SeekFrom::Start(pos))?;
        Ok(header)
    }

    /// Parse the header at offset 0 of `stream`, or `None` if the stream is empty.
    pub fn read<S: Read + Seek>(stream: &mut S) -> SalmonResult<Option<Header>> {
        if stream_len(stream)? == 0 {
            return Ok(None);
        }
        let pos = stream.stream_position()?;
        stream.seek(SeekFrom::Start(0))?;
        let mut data = [0u8; HEADER_LENGTH];
        let read = stream.read_exact(&mut data);
        stream.seek(SeekFrom::Start(pos))?;
        read?;
        let header = Header::from_bytes(&data)?;
        tracing::debug!(
            version = header.version,
            chunk_size = header.chunk_size,
            "parsed stream header"
        );
        Ok(Some(header))
    }
}
