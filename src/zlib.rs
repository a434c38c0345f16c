//! Safe adapter over the zlib inflate API.
//!
//! The resume algorithm needs four things the high-level decompressor
//! wrappers do not expose: header-less ("raw") initialisation with a caller
//! supplied history dictionary, sub-byte priming of the bit reader, the
//! `Z_BLOCK` stop mode that returns at every DEFLATE block boundary, and the
//! post-call `data_type` word describing where the decoder stopped. This
//! module binds them behind [`Inflater`], keeping all `unsafe` in one place.
//!
//! `data_type` layout after an `inflate` call: bit 7 set means the call
//! stopped at a block boundary, bit 6 set means the just-finished block was
//! the stream's final block, and the low 3 bits count the unused bits at the
//! current input byte.

use libc::{c_int, c_uint};
use libz_sys as ffi;

use crate::error::{Error, Result};

/// Flush mode passed to [`Inflater::inflate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flush {
    /// Decompress until input or output runs out.
    NoFlush,
    /// Additionally return at each DEFLATE block boundary.
    Block,
}

impl Flush {
    fn as_c(self) -> c_int {
        match self {
            Flush::NoFlush => ffi::Z_NO_FLUSH,
            Flush::Block => ffi::Z_BLOCK,
        }
    }
}

/// Completion code of an [`Inflater::inflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InflateStatus {
    Ok,
    /// The end of the current DEFLATE stream was reached (trailer included
    /// in container mode).
    StreamEnd,
    /// No forward progress was possible; not an error in itself.
    BufError,
}

/// One zlib inflate state.
///
/// Teardown is handled by `Drop`; a new stream (for example the next member
/// of a concatenated gzip file) gets a fresh `Inflater`.
pub(crate) struct Inflater {
    strm: Box<ffi::z_stream>,
}

// The raw pointers inside z_stream are only ever set for the duration of a
// single inflate call; between calls the state is self-contained.
unsafe impl Send for Inflater {}

impl Inflater {
    /// Initialise in container mode: the decoder parses a zlib or gzip
    /// header itself (`window_bits + 32` requests automatic detection).
    pub(crate) fn container(window_bits: i32) -> Result<Self> {
        Inflater::init(window_bits + 32)
    }

    /// Initialise in raw mode: no header, history supplied by the caller
    /// via [`set_dictionary`]. The negative magnitude is the zlib
    /// convention for header-less streams.
    ///
    /// [`set_dictionary`]: Self::set_dictionary
    pub(crate) fn raw(window_bits: i32) -> Result<Self> {
        Inflater::init(-window_bits)
    }

    fn init(window_bits: i32) -> Result<Self> {
        let mut strm: Box<ffi::z_stream> = Box::new(ffi::z_stream {
            next_in: std::ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: std::ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: std::ptr::null_mut(),
            state: std::ptr::null_mut(),
            zalloc: alloc::zalloc,
            zfree: alloc::zfree,
            opaque: std::ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        });
        let ret = unsafe {
            ffi::inflateInit2_(
                &mut *strm,
                window_bits as c_int,
                ffi::zlibVersion(),
                std::mem::size_of::<ffi::z_stream>() as c_int,
            )
        };
        match ret {
            ffi::Z_OK => Ok(Inflater { strm }),
            ffi::Z_MEM_ERROR => Err(Error::OutOfMemory),
            _ => Err(Error::Internal("inflateInit2 rejected its arguments")),
        }
    }

    /// Feed the top `bits` bits of `byte` into the decoder's bit reader.
    /// Used when a resume point's block starts inside the preceding byte.
    pub(crate) fn prime(&mut self, bits: u8, byte: u8) -> Result<()> {
        debug_assert!((1..=7).contains(&bits));
        let value = c_int::from(byte >> (8 - bits));
        match unsafe { ffi::inflatePrime(&mut *self.strm, c_int::from(bits), value) } {
            ffi::Z_OK => Ok(()),
            _ => Err(Error::Internal("inflatePrime failed")),
        }
    }

    /// Install the 32 KiB history window a raw-mode resume needs to resolve
    /// back-references reaching before the resume point.
    pub(crate) fn set_dictionary(&mut self, window: &[u8]) -> Result<()> {
        let ret = unsafe {
            ffi::inflateSetDictionary(
                &mut *self.strm,
                window.as_ptr(),
                window.len() as c_uint,
            )
        };
        match ret {
            ffi::Z_OK => Ok(()),
            ffi::Z_DATA_ERROR => Err(Error::BadData),
            _ => Err(Error::Internal("inflateSetDictionary failed")),
        }
    }

    /// Decompress from `input` into `output`, returning
    /// `(bytes_consumed, bytes_produced, status)`.
    ///
    /// Inputs and outputs larger than the codec's 32-bit capacity fields are
    /// clamped; the caller's loop refills as needed.
    pub(crate) fn inflate(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> Result<(usize, usize, InflateStatus)> {
        let in_len = input.len().min(c_uint::MAX as usize);
        let out_len = output.len().min(c_uint::MAX as usize);

        self.strm.next_in = input.as_ptr() as *mut _;
        self.strm.avail_in = in_len as c_uint;
        self.strm.next_out = output.as_mut_ptr();
        self.strm.avail_out = out_len as c_uint;

        let ret = unsafe { ffi::inflate(&mut *self.strm, flush.as_c()) };

        let consumed = in_len - self.strm.avail_in as usize;
        let produced = out_len - self.strm.avail_out as usize;

        let status = match ret {
            ffi::Z_OK => InflateStatus::Ok,
            ffi::Z_STREAM_END => InflateStatus::StreamEnd,
            // The output buffer is full or the input is insufficient to make
            // progress; normalised here, detected by the caller via the
            // consumed/produced counts.
            ffi::Z_BUF_ERROR => InflateStatus::BufError,
            ffi::Z_MEM_ERROR => return Err(Error::OutOfMemory),
            // A raw-mode stream demanding a dictionary mid-stream means the
            // resume state was wrong; treat like corrupt data.
            ffi::Z_DATA_ERROR | ffi::Z_NEED_DICT => return Err(Error::BadData),
            _ => return Err(Error::Internal("unexpected inflate return code")),
        };
        Ok((consumed, produced, status))
    }

    /// Raw `data_type` word from the last `inflate` call.
    fn data_type(&self) -> c_int {
        self.strm.data_type
    }

    /// True when the last call stopped at a DEFLATE block boundary.
    pub(crate) fn at_block_boundary(&self) -> bool {
        self.data_type() & 128 != 0
    }

    /// True when the block just finished was the final block of its stream.
    pub(crate) fn at_last_block(&self) -> bool {
        self.data_type() & 64 != 0
    }

    /// Number of unused bits at the current input byte, in [0, 7]. This is
    /// the `bits` value recorded with an index point.
    pub(crate) fn unused_bits(&self) -> u8 {
        (self.data_type() & 7) as u8
    }
}

impl Drop for Inflater {
    fn drop(&mut self) {
        unsafe {
            ffi::inflateEnd(&mut *self.strm);
        }
    }
}

/// zlib's `zalloc`/`zfree` hooks, wired to the global Rust allocator.
///
/// `z_stream::zalloc`/`zfree` are typed as non-nullable function pointers, so
/// the struct can't be built by zero-initialising it (zlib's own convention
/// of "pass null to use the default allocator" doesn't fit that type); these
/// stand in for that default, matching what zlib's built-in allocator does.
mod alloc {
    use libc::c_uint;
    use libz_sys as ffi;
    use std::alloc::{self, Layout};

    const ALIGN: usize = std::mem::align_of::<usize>();

    fn align_up(size: usize, align: usize) -> usize {
        (size + align - 1) & !(align - 1)
    }

    pub(super) extern "C" fn zalloc(_opaque: ffi::voidpf, items: c_uint, size: c_uint) -> ffi::voidpf {
        let requested = match (items as usize)
            .checked_mul(size as usize)
            .map(|n| align_up(n, ALIGN))
            .and_then(|n| n.checked_add(std::mem::size_of::<usize>()))
        {
            Some(n) => n,
            None => return std::ptr::null_mut(),
        };
        let layout = match Layout::from_size_align(requested, ALIGN) {
            Ok(layout) => layout,
            Err(_) => return std::ptr::null_mut(),
        };
        unsafe {
            let ptr = alloc::alloc(layout) as *mut usize;
            if ptr.is_null() {
                return ptr as ffi::voidpf;
            }
            *ptr = requested;
            ptr.add(1) as ffi::voidpf
        }
    }

    pub(super) extern "C" fn zfree(_opaque: ffi::voidpf, address: ffi::voidpf) {
        unsafe {
            let ptr = (address as *mut usize).offset(-1);
            let size = *ptr;
            let layout = Layout::from_size_align_unchecked(size, ALIGN);
            alloc::dealloc(ptr as *mut u8, layout);
        }
    }
}
