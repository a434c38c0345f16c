//! The inflate engine: one flag-driven entry point that both the index
//! builder and the read path drive.
//!
//! A single call decompresses into a bounded output slice until the slice is
//! full, a DEFLATE block boundary is reached (only under `stop_at_block`),
//! end of input is observed, or the current stream ends and no concatenated
//! gzip member follows. Decoder state, the read buffer and the running
//! compressed/uncompressed offsets live on the [`Index`] so that a sequence
//! of calls can walk the stream without re-seeking; the `init_*`/`free_*`
//! flags say which of those resources a call creates or releases.

use log::trace;
use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::index::Index;
use crate::point::Locate;
use crate::zlib::{Flush, InflateStatus, Inflater};

/// Control flags for a single [`Index::inflate_step`] call.
///
/// The builder and the read path compose these the same way: a first call
/// that initialises the decoder and read buffer and positions via an index
/// point, any number of bare continuation calls, and a final call that
/// releases everything.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StepFlags {
    /// Create a fresh decoder before decompressing, seeded from the located
    /// index point (raw mode) or from the start of the file (container mode).
    pub init_stream: bool,
    /// Tear the decoder down before returning.
    pub free_stream: bool,
    /// Allocate the compressed-data read buffer.
    pub init_readbuf: bool,
    /// Release the read buffer before returning.
    pub free_readbuf: bool,
    /// Forget any buffered-but-unconsumed compressed bytes.
    pub clear_readbuf: bool,
    /// Position at `offset` by locating the preceding index point, instead
    /// of resuming from the engine's saved offsets.
    pub use_offset: bool,
    /// Ask the decoder to return at each DEFLATE block boundary.
    pub stop_at_block: bool,
}

impl StepFlags {
    /// First call of an index-building walk.
    pub(crate) fn start_indexing() -> Self {
        StepFlags {
            init_stream: true,
            init_readbuf: true,
            clear_readbuf: true,
            use_offset: true,
            stop_at_block: true,
            ..Default::default()
        }
    }

    /// Continuation call of an index-building walk.
    pub(crate) fn resume_indexing() -> Self {
        StepFlags {
            stop_at_block: true,
            ..Default::default()
        }
    }

    /// First call of a read (discard or deliver).
    pub(crate) fn start_reading() -> Self {
        StepFlags {
            init_stream: true,
            init_readbuf: true,
            clear_readbuf: true,
            use_offset: true,
            ..Default::default()
        }
    }

    /// Continuation call of a read.
    pub(crate) fn resume_reading() -> Self {
        StepFlags::default()
    }

    /// Final call releasing the decoder and read buffer.
    pub(crate) fn teardown() -> Self {
        StepFlags {
            free_stream: true,
            free_readbuf: true,
            clear_readbuf: true,
            ..Default::default()
        }
    }
}

/// How an [`Index::inflate_step`] call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// The output slice was fully written with no other stop condition.
    Ok,
    /// The output slice filled before a block boundary was found
    /// (`stop_at_block` only).
    OutputFull,
    /// Stopped at a DEFLATE block boundary or stream end
    /// (`stop_at_block` only).
    BlockBoundary,
    /// End of the compressed input (at most the 8-byte gzip footer may
    /// remain unconsumed).
    Eof,
    /// `use_offset` named a compressed offset with no preceding index point.
    NotCovered,
}

/// Per-call byte accounting: deltas since the call began.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepResult {
    pub status: Status,
    /// Compressed bytes consumed by this call.
    pub consumed: u64,
    /// Uncompressed bytes produced by this call.
    pub produced: u64,
}

/// Locate the two-byte gzip magic in `buf`, returning the number of bytes
/// of padding before it.
fn find_gzip_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == [0x1f, 0x8b])
}

impl<R: Read + Seek> Index<R> {
    /// Decompress into `out` according to `flags`. See the module docs for
    /// the stop conditions; the returned counts are deltas for this call.
    ///
    /// With `use_offset`, decompression starts from the index point
    /// preceding `offset` (container mode from the file start when `offset`
    /// is zero); otherwise it continues from the offsets saved by the
    /// previous call.
    pub(crate) fn inflate_step(
        &mut self,
        offset: u64,
        flags: StepFlags,
        out: &mut [u8],
    ) -> Result<StepResult> {
        // A call either brings its own read buffer into existence or relies
        // on one left behind by an earlier call; anything else is a caller
        // sequencing bug.
        if flags.init_readbuf == self.reader.has_buf() {
            return Err(Error::Internal("read buffer state does not match flags"));
        }

        trace!(
            "inflate_step: offset={offset} out_len={} init_stream={} use_offset={} stop_at_block={}",
            out.len(),
            flags.init_stream,
            flags.use_offset,
            flags.stop_at_block,
        );

        // Starting offsets: from the located point (or zero) under
        // `use_offset`, otherwise from where the previous call stopped.
        let (mut cmp_offset, mut uncmp_offset, start) = if flags.use_offset {
            if offset == 0 {
                (0, 0, None)
            } else {
                match self.points.locate(offset, true) {
                    Locate::Found(p) => (p.cmp_offset, p.uncmp_offset, Some(p)),
                    Locate::NotIndexed => {
                        return Ok(StepResult {
                            status: Status::NotCovered,
                            consumed: 0,
                            produced: 0,
                        })
                    }
                    Locate::OutOfRange => {
                        return Err(Error::Internal("resume offset past end of input"))
                    }
                }
            }
        } else {
            (self.inflate_cmp_offset, self.inflate_uncmp_offset, None)
        };

        if flags.init_stream {
            self.stream_ended = false;
            self.inflater = None;
            match start {
                // Resume mid-stream: raw mode, primed with the sub-byte
                // prefix when the block starts inside the preceding byte,
                // history window installed as the dictionary.
                Some(p) => {
                    self.reader.seek_to(p.resume_offset())?;
                    let mut inf = Inflater::raw(self.window_bits)?;
                    if p.bits > 0 {
                        let byte = self.reader.getc()?;
                        inf.prime(p.bits, byte)?;
                    }
                    if let Some(window) = p.window() {
                        inf.set_dictionary(window)?;
                    }
                    self.inflater = Some(inf);
                }
                // Start of file: let the decoder parse the zlib/gzip header.
                None => {
                    self.reader.seek_to(0)?;
                    self.inflater = Some(Inflater::container(self.window_bits)?);
                }
            }
        }

        if flags.init_readbuf {
            self.reader.alloc_buf();
        }
        if flags.clear_readbuf {
            self.reader.clear_offsets();
        }

        let mut consumed_total: u64 = 0;
        let mut produced_total: u64 = 0;
        let mut out_pos: usize = 0;
        let mut status = Status::Ok;

        'outer: while out_pos < out.len() {
            if self.reader.available_len() == 0 {
                if self.reader.eof() {
                    status = Status::Eof;
                    break;
                }
                if self.reader.fill()? == 0 {
                    status = Status::Eof;
                    break;
                }
                trace!(
                    "refilled {} compressed bytes at cmp_offset={cmp_offset}",
                    self.reader.available_len()
                );
            }

            while self.reader.available_len() > 0 {
                // The previous inflate finished a stream. If the input
                // continues, it can only be a concatenated gzip member:
                // scan past any padding for the member magic and restart
                // the decoder on it. Skipped bytes count as consumed but
                // produce nothing.
                if self.stream_ended {
                    match find_gzip_magic(self.reader.available()) {
                        Some(skip) => {
                            trace!("concatenated member after {skip} bytes of padding");
                            self.inflater = Some(Inflater::container(self.window_bits)?);
                            self.reader.consume(skip);
                            cmp_offset += skip as u64;
                            consumed_total += skip as u64;
                            self.stream_ended = false;
                        }
                        None => {
                            status = Status::Eof;
                            break 'outer;
                        }
                    }
                }

                let flush = if flags.stop_at_block {
                    Flush::Block
                } else {
                    Flush::NoFlush
                };
                let inf = self
                    .inflater
                    .as_mut()
                    .ok_or(Error::Internal("no decoder state"))?;
                let (consumed, produced, z) =
                    inf.inflate(self.reader.available(), &mut out[out_pos..], flush)?;
                self.reader.consume(consumed);
                cmp_offset += consumed as u64;
                uncmp_offset += produced as u64;
                consumed_total += consumed as u64;
                produced_total += produced as u64;
                out_pos += produced;

                if z == InflateStatus::StreamEnd {
                    self.stream_ended = true;
                } else if z == InflateStatus::BufError && consumed == 0 && produced == 0 {
                    // No forward progress is possible on the remaining
                    // input; treat the file as ended.
                    status = Status::Eof;
                    break 'outer;
                }

                let inf = self.inflater.as_ref().unwrap();
                let boundary = z == InflateStatus::StreamEnd
                    || (inf.at_block_boundary() && !inf.at_last_block());
                if boundary && flags.stop_at_block {
                    status = Status::BlockBoundary;
                    break 'outer;
                }

                if out_pos == out.len() {
                    if flags.stop_at_block {
                        status = Status::OutputFull;
                    }
                    break 'outer;
                }

                // The gzip footer is never consumed by a raw-mode decoder;
                // up to 8 trailing bytes at end of input mean the file is
                // done.
                if self.reader.eof() && self.reader.available_len() <= 8 {
                    status = Status::Eof;
                    break 'outer;
                }
            }
        }

        if flags.free_readbuf {
            self.reader.free_buf();
        }
        if flags.free_stream {
            self.inflater = None;
            self.stream_ended = false;
        }

        // Save the positions so a bare continuation call can pick up here.
        self.inflate_cmp_offset = cmp_offset;
        self.inflate_uncmp_offset = uncmp_offset;

        trace!(
            "inflate_step done: status={status:?} consumed={consumed_total} produced={produced_total} \
             cmp_offset={cmp_offset} uncmp_offset={uncmp_offset}"
        );

        Ok(StepResult {
            status,
            consumed: consumed_total,
            produced: produced_total,
        })
    }
}
