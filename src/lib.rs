//! gzindex — random read access into DEFLATE-compressed data.
//!
//! Reading a range from the middle of a gzip or zlib stream normally means
//! decompressing everything before it. This crate builds an in-memory
//! access index instead: while walking the compressed stream once, it
//! records the exact decoder state (compressed/uncompressed offsets,
//! sub-byte bit position, and the preceding 32 KiB of output used as a
//! dictionary) at DEFLATE block boundaries roughly every `spacing`
//! uncompressed bytes. A later `seek`/`read` resumes the decoder from the
//! nearest preceding point and decompresses only the remainder.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::SeekFrom;
//! use gzindex::Index;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("big.gz")?;
//! let mut index = Index::with_defaults(file)?;
//! index.seek(SeekFrom::Start(5_000_000))?;
//! let mut buf = vec![0u8; 4096];
//! let n = index.read(&mut buf)?;
//! println!("got {n} bytes from the middle of big.gz");
//! # Ok(())
//! # }
//! ```
//!
//! Concatenated gzip members are handled transparently. The index lives in
//! memory only and must be used from a single thread at a time.

pub mod cli;
mod engine;
mod error;
mod index;
mod point;
mod reader;
mod zlib;

/// Crate error type; see the variants for the failure taxonomy.
pub use error::{Error, Result};

/// The random-access index over a seekable compressed source.
pub use index::Index;

/// Construction parameters: spacing, window size, read-buffer size,
/// auto-build.
pub use index::IndexOptions;

/// A single decoder resume point.
pub use point::Point;

/// Smallest permitted history window (the zlib dictionary minimum).
pub use index::MIN_WINDOW_SIZE;

/// Default uncompressed spacing between points.
pub use index::DEFAULT_SPACING;

/// Default compressed read-buffer size.
pub use index::DEFAULT_READBUF_SIZE;
