//! Writable view over one partition of a pre-sized output buffer.
//!
//! Offsets are absolute: the window covering `[start, start + buf.len())`
//! accepts seeks and writes in that coordinate space, so a cipher stream
//! layered on top computes physical offsets exactly as it would over the
//! whole buffer.

use std::io::{self, Seek, SeekFrom, Write};

pub(crate) struct WindowStream<'a> {
    buf: &'a mut [u8],
    start: u64,
    pos: u64,
}

impl<'a> WindowStream<'a> {
    pub(crate) fn new(buf: &'a mut [u8], start: u64) -> Self {
        Self {
            buf,
            start,
            pos: start,
        }
    }

    fn end(&self) -> u64 {
        self.start + self.buf.len() as u64
    }
}

impl Write for WindowStream<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.pos < self.start || self.pos > self.end() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write at {} outside of window [{}, {})",
                    self.pos,
                    self.start,
                    self.end()
                ),
            ));
        }
        let offset = (self.pos - self.start) as usize;
        let n = data.len().min(self.buf.len() - offset);
        self.buf[offset..offset + n].copy_from_slice(&data[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for WindowStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.end().checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position")
        })?;
        self.pos = target;
        Ok(target)
    }
}
