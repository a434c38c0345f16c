//! The access index and its public API.
//!
//! [`Index`] wraps a seekable compressed source and a list of resume points.
//! `build` walks the stream once in block-boundary mode, recording a point
//! roughly every `spacing` uncompressed bytes; `seek`/`read` then serve any
//! uncompressed range by resuming the decoder from the nearest preceding
//! point, discarding the prefix and delivering the requested bytes. With
//! auto-build enabled (the default) the index grows itself on demand, so no
//! explicit `build` call is needed.

use log::debug;
use std::io::{self, Read, Seek, SeekFrom};

use crate::engine::{Status, StepFlags};
use crate::error::{Error, Result};
use crate::point::{Locate, Point, PointList};
use crate::reader::StreamReader;
use crate::zlib::Inflater;

/// Smallest history window zlib guarantees is sufficient for resuming with
/// a dictionary.
pub const MIN_WINDOW_SIZE: usize = 32768;

/// Default uncompressed distance between adjacent index points.
pub const DEFAULT_SPACING: u64 = 1_048_576;

/// Default compressed read-buffer size.
pub const DEFAULT_READBUF_SIZE: usize = 16_384;

/// Construction parameters for an [`Index`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Target minimum distance, in uncompressed bytes, between adjacent
    /// index points. Must exceed `window_size`.
    pub spacing: u64,
    /// History window stored with each point. Must be at least
    /// [`MIN_WINDOW_SIZE`]; larger is permitted but rarely useful.
    pub window_size: usize,
    /// Size of the compressed-data read buffer.
    pub readbuf_size: usize,
    /// Grow the index on demand when a seek or read lands beyond its
    /// current coverage.
    pub auto_build: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            spacing: DEFAULT_SPACING,
            window_size: MIN_WINDOW_SIZE,
            readbuf_size: DEFAULT_READBUF_SIZE,
            auto_build: true,
        }
    }
}

/// Copied-out coordinates of a located index point. Borrow-free so the
/// index can be mutated after locating.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    cmp_offset: u64,
    uncmp_offset: u64,
    resume_offset: u64,
}

impl Anchor {
    fn of(p: &Point) -> Self {
        Anchor {
            cmp_offset: p.cmp_offset,
            uncmp_offset: p.uncmp_offset,
            resume_offset: p.resume_offset(),
        }
    }
}

/// Random-access index over a DEFLATE-compressed source.
///
/// The source must be exclusively owned by the index: internal resume
/// cursors and the read buffer are per-index state, and no internal locking
/// is performed.
pub struct Index<R> {
    pub(crate) reader: StreamReader<R>,
    pub(crate) points: PointList,
    pub(crate) spacing: u64,
    pub(crate) window_size: usize,
    pub(crate) window_bits: i32,
    pub(crate) auto_build: bool,
    /// Live decoder state between engine calls, if any.
    pub(crate) inflater: Option<Inflater>,
    /// Set when the decoder finished a stream and a concatenated member may
    /// follow.
    pub(crate) stream_ended: bool,
    /// Engine resume position in the compressed stream.
    pub(crate) inflate_cmp_offset: u64,
    /// Engine resume position in the uncompressed stream.
    pub(crate) inflate_uncmp_offset: u64,
    /// The caller's logical position in the uncompressed stream.
    pub(crate) uncmp_seek_offset: u64,
}

impl<R: Read + Seek> Index<R> {
    /// Create an index over `source` with the given options.
    ///
    /// Measures the compressed size via seek-end/seek-start and validates
    /// the spacing/window constraints; no decompression happens here.
    pub fn new(source: R, opts: IndexOptions) -> Result<Self> {
        if opts.window_size < MIN_WINDOW_SIZE {
            return Err(Error::WindowTooSmall(opts.window_size));
        }
        // Each point stores window_size bytes of history, so points closer
        // together than the window would cost more than they save.
        if opts.spacing <= opts.window_size as u64 {
            return Err(Error::SpacingTooSmall {
                spacing: opts.spacing,
                window_size: opts.window_size,
            });
        }

        let reader = StreamReader::new(source, opts.readbuf_size)?;
        let compressed_size = reader.size();
        let window_bits = (opts.window_size as f64).log2().round() as i32;

        Ok(Index {
            reader,
            points: PointList::new(opts.spacing, opts.window_size, compressed_size),
            spacing: opts.spacing,
            window_size: opts.window_size,
            window_bits,
            auto_build: opts.auto_build,
            inflater: None,
            stream_ended: false,
            inflate_cmp_offset: 0,
            inflate_uncmp_offset: 0,
            uncmp_seek_offset: 0,
        })
    }

    /// Create an index with default options.
    pub fn with_defaults(source: R) -> Result<Self> {
        Index::new(source, IndexOptions::default())
    }

    /// Size of the compressed input in bytes.
    pub fn compressed_size(&self) -> u64 {
        self.reader.size()
    }

    /// Number of access points currently in the index.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Target spacing between points, in uncompressed bytes.
    pub fn spacing(&self) -> u64 {
        self.spacing
    }

    /// History window size stored with each point.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// The access points, in stream order.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// The point that a read at uncompressed `offset` would resume from, if
    /// the index already covers it. Never expands the index.
    pub fn point_preceding(&self, offset: u64) -> Option<&Point> {
        match self.points.locate(offset, false) {
            Locate::Found(p) => Some(p),
            _ => None,
        }
    }

    // ─── Building ─────────────────────────────────────────────────────────────

    /// (Re)build the index from compressed offset `from` up to `until`
    /// (`0` meaning the whole input). Points before `from` are preserved;
    /// points at or after it are dropped and regenerated.
    pub fn build(&mut self, from: u64, until: u64) -> Result<()> {
        self.points.truncate_from(from);
        let until = if until == 0 {
            self.compressed_size()
        } else {
            until
        };
        self.expand(until)
    }

    /// Grow the index until its last point is at or past compressed offset
    /// `until`, or the stream ends.
    pub(crate) fn expand(&mut self, until: u64) -> Result<()> {
        match self.expand_impl(until) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.abort_engine();
                Err(e)
            }
        }
    }

    fn expand_impl(&mut self, mut until: u64) -> Result<()> {
        // Seed from the last point when the index has real coverage; with
        // at most the stream-start point recorded, walking from the file
        // start is just as cheap and needs no dictionary.
        let seed = if self.points.len() > 1 {
            let last = self.points.last().expect("len checked");
            if until <= last.cmp_offset {
                return Ok(());
            }
            Some(Anchor::of(last))
        } else {
            None
        };

        if until == 0 {
            until = self.spacing;
        }

        debug!("expanding index to compressed offset {until}");

        // Sliding uncompressed scratch region. Decoded bytes wrap around
        // it, so the window_size bytes preceding any candidate point are
        // always present, possibly split across the wrap.
        let ring_size = (4 * self.spacing) as usize;
        let mut ring = vec![0u8; ring_size];
        let mut ring_pos = 0usize;

        let (mut cmp_offset, mut uncmp_offset, mut last_recorded) = match seed {
            Some(a) => (a.cmp_offset, a.uncmp_offset, a.uncmp_offset),
            None => (0, 0, 0),
        };

        let mut first = true;
        let mut points_created = 0u64;

        let walk = loop {
            if cmp_offset >= self.compressed_size()
                || (cmp_offset >= until && points_created > 0)
            {
                break Ok(());
            }

            let flags = if first {
                StepFlags::start_indexing()
            } else {
                StepFlags::resume_indexing()
            };
            let step = match self.inflate_step(cmp_offset, flags, &mut ring[ring_pos..]) {
                Ok(s) => s,
                Err(e) => break Err(e),
            };
            first = false;

            cmp_offset += step.consumed;
            uncmp_offset += step.produced;
            ring_pos = (ring_pos + step.produced as usize) % ring_size;

            match step.status {
                // Scratch region filled before a boundary: keep going, the
                // wrap-around cursor keeps the trailing window intact.
                Status::OutputFull => continue,
                Status::Eof => break Ok(()),
                Status::BlockBoundary => {}
                Status::Ok | Status::NotCovered => {
                    break Err(Error::Internal("unexpected engine status while indexing"))
                }
            }

            let inf = match self.inflater.as_ref() {
                Some(inf) => inf,
                None => break Err(Error::Internal("decoder state lost while indexing")),
            };

            // Record a point here if this boundary does not belong to a
            // stream's final block, and either it is the stream-start
            // boundary or enough uncompressed data has passed since the
            // last recorded point. Final blocks are excluded because a
            // resume point there has no following block to stop at.
            let eligible = !inf.at_last_block()
                && if uncmp_offset == 0 {
                    self.points.is_empty()
                } else {
                    uncmp_offset - last_recorded >= self.spacing
                };

            if eligible {
                let bits = inf.unused_bits();
                if let Err(e) = self.points.append_from_ring(
                    bits,
                    cmp_offset,
                    uncmp_offset,
                    &ring,
                    ring_pos,
                ) {
                    break Err(e);
                }
                points_created += 1;
                last_recorded = uncmp_offset;
            }
        };

        // Release the decoder and read buffer whether or not the walk
        // succeeded.
        if !first {
            let td = self.inflate_step(0, StepFlags::teardown(), &mut [])?;
            if walk.is_ok() && !matches!(td.status, Status::Ok | Status::Eof) {
                return Err(Error::Internal("engine teardown failed"));
            }
        }
        walk?;

        self.points.shrink_to_fit();
        debug!(
            "index now has {} points, covering to compressed offset {:?}",
            self.points.len(),
            self.points.last().map(|p| p.cmp_offset)
        );
        Ok(())
    }

    // ─── Locating ─────────────────────────────────────────────────────────────

    /// Estimate the compressed offset corresponding to an uncompressed one,
    /// scaling by the last point's ratio, or guessing conservatively when
    /// fewer than two points exist. Only bounds how far `expand` walks;
    /// `locate` re-checks afterwards.
    fn estimate_cmp(&self, offset: u64) -> u64 {
        match self.points.last() {
            Some(last) if self.points.len() > 1 && last.uncmp_offset > 0 => {
                let ratio = last.cmp_offset as f64 / last.uncmp_offset as f64;
                (offset as f64 * ratio).round() as u64
            }
            _ => (offset as f64 * 0.8).round() as u64,
        }
    }

    /// Locate the point preceding the uncompressed `offset`, expanding the
    /// index as needed when auto-build is on.
    ///
    /// A target past the end of the uncompressed data resolves to the last
    /// point the stream has; the following read then reports EOF.
    fn locate_with_expand(&mut self, offset: u64, by_compressed: bool) -> Result<Anchor> {
        if !self.auto_build {
            return match self.points.locate(offset, by_compressed) {
                Locate::Found(p) => Ok(Anchor::of(p)),
                Locate::NotIndexed => Err(Error::NotCovered),
                Locate::OutOfRange => Err(Error::NotCovered),
            };
        }

        loop {
            match self.points.locate(offset, by_compressed) {
                Locate::Found(p) => return Ok(Anchor::of(p)),
                Locate::OutOfRange => return Err(Error::NotCovered),
                Locate::NotIndexed => {}
            }

            let mut expand_to = if by_compressed {
                offset
            } else {
                self.estimate_cmp(offset)
            };
            if offset >= self.compressed_size() {
                expand_to = self.compressed_size();
            }

            let covered_before = self.points.last().map(|p| p.cmp_offset);
            self.expand(expand_to)?;
            let covered_after = self.points.last().map(|p| p.cmp_offset);

            if matches!(self.points.locate(offset, by_compressed), Locate::NotIndexed)
                && (expand_to >= self.compressed_size() || covered_after == covered_before)
            {
                // The index has been expanded as far as the input allows;
                // the target lies past the end of the uncompressed data.
                // Resolve to the last point and let the read report EOF.
                return match self.points.last() {
                    Some(p) => Ok(Anchor::of(p)),
                    None => Err(Error::NotCovered),
                };
            }
        }
    }

    // ─── Seeking and reading ──────────────────────────────────────────────────

    /// Reposition in the uncompressed stream. Only `SeekFrom::Start` and
    /// `SeekFrom::Current` are supported; the uncompressed size is unknown
    /// until the stream has been fully walked, so `SeekFrom::End` is
    /// rejected.
    ///
    /// Seeking decompresses nothing: it locates the preceding point
    /// (expanding the index when auto-build is on), records the logical
    /// position, and repositions the source at the point's resume byte. A
    /// target past the end of the data succeeds; the next read returns 0.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(d) => i128::from(self.uncmp_seek_offset) + i128::from(d),
            SeekFrom::End(_) => return Err(Error::SeekFromEnd),
        };
        if target < 0 {
            return Err(Error::NegativeSeek);
        }
        let target = target as u64;

        let anchor = self.locate_with_expand(target, false)?;
        self.uncmp_seek_offset = target;
        self.reader.seek_to(anchor.resume_offset)?;
        Ok(target)
    }

    /// Current logical position in the uncompressed stream.
    pub fn tell(&self) -> u64 {
        self.uncmp_seek_offset
    }

    /// Read up to `buf.len()` bytes at the current uncompressed position.
    ///
    /// Returns the number of bytes delivered and advances the position by
    /// that count. End of data yields a short or zero count, never an
    /// error. When auto-build is off and the position is beyond the index,
    /// fails with [`Error::NotCovered`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_impl(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.abort_engine();
                Err(e)
            }
        }
    }

    fn read_impl(&mut self, buf: &mut [u8]) -> Result<usize> {
        let target = self.uncmp_seek_offset;
        let anchor = self.locate_with_expand(target, false)?;

        debug!(
            "read: {} bytes at uncompressed offset {target}, resuming from point at \
             cmp={} uncmp={}",
            buf.len(),
            anchor.cmp_offset,
            anchor.uncmp_offset
        );

        let mut cmp_offset = anchor.cmp_offset;
        let mut uncmp_offset = anchor.uncmp_offset;
        let mut first = true;
        let mut hit_eof = false;

        // Decompress and discard from the point up to the seek position.
        // On average this is spacing / 2 bytes; the buffer is oversized to
        // keep the call count down.
        if uncmp_offset < target {
            let mut discard = vec![0u8; (4 * self.spacing) as usize];
            while uncmp_offset < target {
                let flags = if first {
                    StepFlags::start_reading()
                } else {
                    StepFlags::resume_reading()
                };
                let len = (target - uncmp_offset).min(discard.len() as u64) as usize;
                let step = self.inflate_step(cmp_offset, flags, &mut discard[..len])?;
                first = false;
                cmp_offset += step.consumed;
                uncmp_offset += step.produced;
                match step.status {
                    Status::Ok | Status::OutputFull => {}
                    Status::Eof => {
                        hit_eof = true;
                        break;
                    }
                    Status::NotCovered => return Err(Error::NotCovered),
                    Status::BlockBoundary => {
                        return Err(Error::Internal("unexpected block stop while reading"))
                    }
                }
            }
        }

        // Deliver into the caller's buffer. The engine refills the codec's
        // 32-bit output capacity internally, so one call per loop iteration
        // suffices unless EOF interrupts.
        let mut delivered = 0usize;
        if !hit_eof {
            if uncmp_offset != target {
                return Err(Error::Internal("discard overshot the seek position"));
            }
            while delivered < buf.len() {
                let flags = if first {
                    StepFlags::start_reading()
                } else {
                    StepFlags::resume_reading()
                };
                let step = self.inflate_step(cmp_offset, flags, &mut buf[delivered..])?;
                first = false;
                cmp_offset += step.consumed;
                uncmp_offset += step.produced;
                delivered += step.produced as usize;
                match step.status {
                    Status::Eof => break,
                    Status::Ok | Status::OutputFull => {
                        if step.produced == 0 {
                            break;
                        }
                    }
                    Status::NotCovered => return Err(Error::NotCovered),
                    Status::BlockBoundary => {
                        return Err(Error::Internal("unexpected block stop while reading"))
                    }
                }
            }
        }

        if !first {
            let td = self.inflate_step(0, StepFlags::teardown(), &mut [])?;
            if !matches!(td.status, Status::Ok | Status::Eof) {
                return Err(Error::Internal("engine teardown failed"));
            }
        }

        self.uncmp_seek_offset += delivered as u64;
        Ok(delivered)
    }

    /// Drop any engine state left behind by a failed operation so the index
    /// stays usable.
    fn abort_engine(&mut self) {
        self.inflater = None;
        self.stream_ended = false;
        self.reader.free_buf();
    }
}

// The index reads and seeks like a file over the uncompressed data, the
// usual way to compose it with code expecting `io` traits. `SeekFrom::End`
// and uncovered offsets surface as `io::Error`.
impl<R: Read + Seek> Read for Index<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Index::read(self, buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek> Seek for Index<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Index::seek(self, pos).map_err(io::Error::from)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.tell())
    }
}
