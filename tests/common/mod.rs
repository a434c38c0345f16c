//! Shared fixture generators for the integration suites.
//!
//! All fixtures are generated in memory with `flate2` (gzip / zlib
//! encoders) and `rand` (seeded, so every run sees identical bytes), and
//! served to the index from a `Cursor<Vec<u8>>`.

#![allow(dead_code)]

use flate2::read::MultiGzDecoder;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::io::{Read, Write};

/// Compress `data` as a single gzip member.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("gzip fixture write");
    enc.finish().expect("gzip fixture finish")
}

/// Compress `data` as a zlib stream.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("zlib fixture write");
    enc.finish().expect("zlib fixture finish")
}

/// Concatenate independently gzipped members into one file.
pub fn concat_gzip(members: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for m in members {
        out.extend_from_slice(&gzip(m));
    }
    out
}

/// Fully decompress a (possibly multi-member) gzip file; the reference
/// against which random-access reads are checked.
pub fn reference_gunzip(compressed: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    MultiGzDecoder::new(compressed)
        .read_to_end(&mut out)
        .expect("reference decompression");
    out
}

/// `len` seeded pseudo-random bytes. Incompressible, which keeps DEFLATE
/// block boundaries dense (stored blocks cap at 64 KiB).
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// `len` seeded bytes drawn from a 16-symbol alphabet. Compressible enough
/// that DEFLATE uses bit-packed Huffman blocks, whose boundaries routinely
/// fall mid-byte.
pub fn compressible_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(b'a'..b'a' + 16)).collect()
}

/// `count` repetitions of `pattern`.
pub fn repeated(pattern: &[u8], count: usize) -> Vec<u8> {
    pattern
        .iter()
        .copied()
        .cycle()
        .take(pattern.len() * count)
        .collect()
}
