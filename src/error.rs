//! Error taxonomy for index construction and random-access reads.
//!
//! Five classes of failure are distinguished:
//! - configuration errors, reported synchronously from [`Index::new`]
//! - I/O errors propagated from the underlying source
//! - codec errors (corrupt data, dictionary demand, allocation failure)
//! - coverage misses (`NotCovered`) when auto-build is disabled
//! - seek validation (negative target, unsupported whence)
//!
//! End of input is never an error: reads report it as a short or zero count.
//!
//! [`Index::new`]: crate::Index::new

use core::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by index construction, building, seeking and reading.
#[derive(Debug)]
pub enum Error {
    /// `window_size` below the 32 KiB minimum required for dictionary resume.
    WindowTooSmall(usize),
    /// `spacing` not strictly greater than `window_size`.
    SpacingTooSmall { spacing: u64, window_size: usize },
    /// The source could not be read or repositioned.
    Io(io::Error),
    /// The compressed data is corrupt, or a raw stream demanded a dictionary
    /// the index could not supply.
    BadData,
    /// The codec could not allocate internal state.
    OutOfMemory,
    /// The requested offset is not covered by the index and auto-build is
    /// disabled. Enable auto-build or call `build` explicitly and retry.
    NotCovered,
    /// Seek resolved to a negative uncompressed offset.
    NegativeSeek,
    /// Seek from the end is unsupported: the uncompressed size is unknown
    /// until the whole stream has been walked.
    SeekFromEnd,
    /// Internal invariant violation in the engine or index bookkeeping.
    Internal(&'static str),
}

impl Error {
    /// Short stable name for the error class.
    pub fn name(&self) -> &'static str {
        match self {
            Error::WindowTooSmall(_) => "window_too_small",
            Error::SpacingTooSmall { .. } => "spacing_too_small",
            Error::Io(_) => "io",
            Error::BadData => "bad_data",
            Error::OutOfMemory => "out_of_memory",
            Error::NotCovered => "not_covered",
            Error::NegativeSeek => "negative_seek",
            Error::SeekFromEnd => "seek_from_end",
            Error::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WindowTooSmall(got) => {
                write!(f, "window size {got} is below the 32768 byte minimum")
            }
            Error::SpacingTooSmall {
                spacing,
                window_size,
            } => write!(
                f,
                "point spacing {spacing} must exceed the window size {window_size}"
            ),
            Error::Io(e) => write!(f, "source I/O error: {e}"),
            Error::BadData => f.write_str("compressed data is corrupt"),
            Error::OutOfMemory => f.write_str("codec allocation failure"),
            Error::NotCovered => {
                f.write_str("offset not covered by the index (auto-build disabled)")
            }
            Error::NegativeSeek => f.write_str("seek resolves to a negative offset"),
            Error::SeekFromEnd => f.write_str("seeking from the end is not supported"),
            Error::Internal(what) => write!(f, "internal error: {what}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            Error::BadData => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            Error::NotCovered => io::Error::new(io::ErrorKind::NotFound, e.to_string()),
            Error::NegativeSeek | Error::SeekFromEnd => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            other => io::Error::other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_stable() {
        assert_eq!(Error::NotCovered.name(), "not_covered");
        assert_eq!(Error::BadData.name(), "bad_data");
        assert!(Error::WindowTooSmall(16384).to_string().contains("16384"));
    }

    #[test]
    fn io_round_trip_preserves_kind() {
        let src = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err = Error::from(src);
        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn not_covered_maps_to_not_found() {
        let back: io::Error = Error::NotCovered.into();
        assert_eq!(back.kind(), io::ErrorKind::NotFound);
    }
}
