//! Buffered reader over the compressed input source.
//!
//! Owns the compressed-data read buffer and its two cursors: `end` marks how
//! many bytes of the buffer are valid, `offset` how many have already been
//! handed to the decoder. The decoder consumes the slice `[offset, end)`;
//! when it needs more input the buffer is refilled from the source starting
//! at position zero (it is never ring-shifted). The buffer itself is created
//! and released on demand by the inflate engine, so a paused engine can hand
//! its remaining input to the next call without re-reading the source.

use std::io::{self, Read, Seek, SeekFrom};

/// Buffered access to a seekable compressed source.
///
/// The `R: Read + Seek` bound is the crate's form of the "source must be
/// read-only" precondition: a reader cannot be written through.
#[derive(Debug)]
pub(crate) struct StreamReader<R> {
    inner: R,
    /// Total size of the compressed input, measured at construction.
    size: u64,
    buf: Option<Vec<u8>>,
    buf_size: usize,
    /// Bytes of `buf` already handed to the decoder.
    offset: usize,
    /// Bytes of `buf` currently valid.
    end: usize,
    /// Latched once a refill observes the end of the source.
    at_eof: bool,
}

impl<R: Read + Seek> StreamReader<R> {
    /// Wrap `inner`, measuring its total size via seek-end / seek-start.
    pub(crate) fn new(mut inner: R, buf_size: usize) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(StreamReader {
            inner,
            size,
            buf: None,
            buf_size,
            offset: 0,
            end: 0,
            at_eof: false,
        })
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn has_buf(&self) -> bool {
        self.buf.is_some()
    }

    pub(crate) fn alloc_buf(&mut self) {
        self.buf = Some(vec![0u8; self.buf_size]);
    }

    pub(crate) fn free_buf(&mut self) {
        self.buf = None;
        self.offset = 0;
        self.end = 0;
    }

    pub(crate) fn clear_offsets(&mut self) {
        self.offset = 0;
        self.end = 0;
    }

    /// The unconsumed slice of the read buffer.
    pub(crate) fn available(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[self.offset..self.end],
            None => &[],
        }
    }

    pub(crate) fn available_len(&self) -> usize {
        self.end - self.offset
    }

    /// Record that the decoder consumed `n` bytes of [`available`].
    ///
    /// [`available`]: Self::available
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available_len());
        self.offset += n;
    }

    /// Refill the buffer from the source, replacing any unconsumed bytes.
    ///
    /// Reads until the buffer is full or the source is exhausted, mirroring
    /// `fread` semantics: a short fill latches EOF. Returns the number of
    /// bytes now available.
    pub(crate) fn fill(&mut self) -> io::Result<usize> {
        let buf = self
            .buf
            .as_mut()
            .expect("refill requires an allocated read buffer");
        let mut total = 0;
        while total < buf.len() {
            let n = self.inner.read(&mut buf[total..])?;
            if n == 0 {
                self.at_eof = true;
                break;
            }
            total += n;
        }
        self.offset = 0;
        self.end = total;
        Ok(total)
    }

    /// Whether a previous refill observed the end of the source.
    pub(crate) fn eof(&self) -> bool {
        self.at_eof
    }

    /// Reposition the source, discarding the EOF latch.
    pub(crate) fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.at_eof = false;
        Ok(())
    }

    /// Read the single byte at the current source position. Used to obtain
    /// the byte preceding a non-byte-aligned resume point for priming.
    pub(crate) fn getc(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}
