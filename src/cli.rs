//! Command-line interface for the `gzindex` binary.
//!
//! Extracts a byte range from the middle of a gzip/zlib file without
//! decompressing everything before it, or lists the access points the index
//! records for the file.

use std::fs::File;
use std::io::{self, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use crate::{Index, IndexOptions};

/// Random access into DEFLATE-compressed files.
#[derive(Debug, Parser)]
#[command(name = "gzindex", version, about)]
pub struct Args {
    /// Compressed input file (gzip or zlib).
    pub file: PathBuf,

    /// Uncompressed byte offset to start reading from.
    #[arg(short = 'o', long, default_value_t = 0)]
    pub offset: u64,

    /// Number of uncompressed bytes to read and write to stdout.
    #[arg(short = 'l', long, default_value_t = 4096)]
    pub length: usize,

    /// Uncompressed distance between index points.
    #[arg(short = 's', long, default_value_t = crate::DEFAULT_SPACING)]
    pub spacing: u64,

    /// Build the whole index up front instead of expanding on demand.
    #[arg(long)]
    pub build: bool,

    /// List the index points instead of reading data. Implies --build.
    #[arg(long)]
    pub points: bool,
}

/// Run the tool with parsed arguments. Writes extracted bytes to `out`.
pub fn run(args: &Args, out: &mut dyn Write) -> anyhow::Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let opts = IndexOptions {
        spacing: args.spacing,
        ..Default::default()
    };
    let mut index = Index::new(file, opts)
        .with_context(|| format!("cannot index {}", args.file.display()))?;

    if args.build || args.points {
        index
            .build(0, 0)
            .with_context(|| format!("building index over {}", args.file.display()))?;
    }

    if args.points {
        writeln!(out, "{} points over {} compressed bytes:",
                 index.num_points(), index.compressed_size())?;
        for p in index.points() {
            writeln!(
                out,
                "  cmp={:<12} uncmp={:<12} bits={}",
                p.cmp_offset, p.uncmp_offset, p.bits
            )?;
        }
        return Ok(());
    }

    index.seek(SeekFrom::Start(args.offset))?;
    let mut buf = vec![0u8; args.length];
    let mut total = 0;
    while total < buf.len() {
        let n = index.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    if total == 0 && args.length > 0 {
        bail!("offset {} is past the end of the uncompressed data", args.offset);
    }
    out.write_all(&buf[..total])?;
    Ok(())
}

/// Convenience wrapper writing to stdout.
pub fn run_stdout(args: &Args) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    run(args, &mut lock)
}
