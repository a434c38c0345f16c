//! Non-byte-aligned resume points: blocks that start mid-byte must be
//! recorded with their bit offset and resumed exactly.

mod common;

use common::*;
use gzindex::{Index, IndexOptions};
use std::io::{Cursor, SeekFrom};

/// Compressible data forces bit-packed Huffman blocks, so block boundaries
/// routinely fall inside a byte. Dense spacing catches many of them.
fn build_dense_index(data: &[u8]) -> Index<Cursor<Vec<u8>>> {
    let compressed = gzip(data);
    let opts = IndexOptions {
        spacing: 65_536,
        ..Default::default()
    };
    let mut index = Index::new(Cursor::new(compressed), opts).expect("init");
    index.build(0, 0).expect("full build");
    index
}

#[test]
fn some_points_are_not_byte_aligned() {
    let data = compressible_bytes(4 * 1024 * 1024, 13);
    let index = build_dense_index(&data);

    assert!(index.num_points() >= 8, "dense index expected");
    let unaligned = index.points().filter(|p| p.bits > 0).count();
    assert!(
        unaligned > 0,
        "expected at least one mid-byte block boundary among {} points",
        index.num_points()
    );

    // A point resuming mid-byte needs the byte before its compressed
    // offset, so that byte must exist.
    for p in index.points() {
        if p.bits > 0 {
            assert!(p.cmp_offset >= 1);
            assert!(p.bits <= 7);
        }
    }
}

/// Reads that resume from, and cross over, a mid-byte point must be exact.
#[test]
fn reads_crossing_unaligned_points_are_correct() {
    let data = compressible_bytes(4 * 1024 * 1024, 13);
    let compressed = gzip(&data);
    let reference = reference_gunzip(&compressed);
    let mut index = build_dense_index(&data);

    let unaligned: Vec<(u64, u8)> = index
        .points()
        .filter(|p| p.bits > 0)
        .map(|p| (p.uncmp_offset, p.bits))
        .collect();
    assert!(!unaligned.is_empty());

    for &(uncmp, _bits) in unaligned.iter().take(8) {
        // Start just after the point so the read resumes from it, and just
        // before so the read crosses it mid-flight.
        for start in [uncmp, uncmp + 17, uncmp.saturating_sub(29)] {
            index.seek(SeekFrom::Start(start)).expect("seek");
            let mut buf = vec![0u8; 512];
            let n = index.read(&mut buf).expect("read at unaligned point");
            let want =
                &reference[start as usize..(start as usize + 512).min(reference.len())];
            assert_eq!(n, want.len());
            assert_eq!(&buf[..n], want, "mismatch around unaligned point at {uncmp}");
        }
    }
}

/// The point chosen for a read is the greatest one at or before the seek
/// target, even when its true start lies one byte earlier.
#[test]
fn point_lookup_matches_read_resume() {
    let data = compressible_bytes(2 * 1024 * 1024, 17);
    let index = build_dense_index(&data);

    let mid = 1_000_000;
    let p = index.point_preceding(mid).expect("covered offset");
    assert!(p.uncmp_offset <= mid);
    assert_eq!(p.resume_offset(), p.cmp_offset - u64::from(p.bits > 0));
}
