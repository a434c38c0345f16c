//! Index construction: point placement, invariants, idempotence, and
//! truncated rebuilds.

mod common;

use common::*;
use gzindex::{Index, IndexOptions, MIN_WINDOW_SIZE};
use std::io::{Cursor, SeekFrom};

const MIB: u64 = 1024 * 1024;

fn snapshot(index: &Index<Cursor<Vec<u8>>>) -> Vec<(u64, u64, u8, Option<Vec<u8>>)> {
    index
        .points()
        .map(|p| {
            (
                p.cmp_offset,
                p.uncmp_offset,
                p.bits,
                p.window().map(|w| w.to_vec()),
            )
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: uniform data, full index
// ─────────────────────────────────────────────────────────────────────────────

/// Build a full index over 16 MiB of zlib-compressed zeros, then read from
/// the middle. The data is maximally compressible, so block boundaries (and
/// therefore points) are sparse, but every delivered byte must be zero.
#[test]
fn zeros_full_index_and_mid_read() {
    let uncompressed_len = 16 * MIB;
    let compressed = zlib(&vec![0u8; uncompressed_len as usize]);
    let mut index = Index::with_defaults(Cursor::new(compressed)).expect("init");

    index.build(0, 0).expect("full build");
    assert!(index.num_points() >= 2, "expected several points over 16 MiB");

    index.seek(SeekFrom::Start(8 * MIB)).expect("seek to middle");
    let mut buf = vec![0xffu8; 4096];
    let n = index.read(&mut buf).expect("read");
    assert_eq!(n, 4096);
    assert!(buf.iter().all(|&b| b == 0), "mid-file read must be all zeros");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: structural invariants over every point
// ─────────────────────────────────────────────────────────────────────────────

/// Offsets strictly increase, gaps respect the spacing, bits stay in
/// [0, 7], and only the stream-start point lacks a window.
#[test]
fn point_invariants_hold() {
    let spacing = 256 * 1024;
    let data = random_bytes(4 * MIB as usize, 7);
    let compressed = gzip(&data);
    let opts = IndexOptions {
        spacing,
        ..Default::default()
    };
    let mut index = Index::new(Cursor::new(compressed), opts).expect("init");
    index.build(0, 0).expect("full build");

    assert!(index.num_points() >= 4, "incompressible data should index densely");

    let points: Vec<_> = index.points().collect();
    assert_eq!(points[0].uncmp_offset, 0, "first point anchors the stream start");
    assert!(points[0].window().is_none());

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(a.cmp_offset < b.cmp_offset);
        assert!(
            b.uncmp_offset - a.uncmp_offset >= spacing,
            "adjacent points closer than spacing: {} -> {}",
            a.uncmp_offset,
            b.uncmp_offset
        );
    }
    for p in &points[1..] {
        assert!(p.bits <= 7);
        let w = p.window().expect("non-initial points carry a window");
        assert_eq!(w.len(), MIN_WINDOW_SIZE);
    }
}

/// Every non-initial point's window equals the uncompressed bytes
/// immediately preceding its offset.
#[test]
fn windows_match_reference_history() {
    let data = compressible_bytes(2 * MIB as usize, 11);
    let compressed = gzip(&data);
    let reference = reference_gunzip(&compressed);
    assert_eq!(reference, data);

    let opts = IndexOptions {
        spacing: 128 * 1024,
        ..Default::default()
    };
    let mut index = Index::new(Cursor::new(compressed), opts).expect("init");
    index.build(0, 0).expect("full build");

    for p in index.points() {
        if let Some(window) = p.window() {
            let end = p.uncmp_offset as usize;
            let start = end - window.len();
            assert_eq!(
                window,
                &reference[start..end],
                "window mismatch at uncompressed offset {end}"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: idempotence and monotonic coverage
// ─────────────────────────────────────────────────────────────────────────────

/// Building the full index twice yields identical points.
#[test]
fn full_build_is_idempotent() {
    let compressed = gzip(&random_bytes(3 * MIB as usize, 3));
    let mut index = Index::with_defaults(Cursor::new(compressed)).expect("init");

    index.build(0, 0).expect("first build");
    let first = snapshot(&index);
    index.build(0, 0).expect("second build");
    let second = snapshot(&index);

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

/// Expanding coverage preserves previously created points unchanged.
#[test]
fn partial_then_full_build_preserves_points() {
    let compressed = gzip(&random_bytes(6 * MIB as usize, 5));
    let half = compressed.len() as u64 / 2;
    let mut index = Index::with_defaults(Cursor::new(compressed)).expect("init");

    index.build(0, half).expect("partial build");
    let partial = snapshot(&index);
    assert!(!partial.is_empty());

    index.build(0, 0).expect("full build");
    let full = snapshot(&index);

    assert!(full.len() >= partial.len());
    assert_eq!(&full[..partial.len()], &partial[..]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: truncated rebuild
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuilding from a mid-file compressed offset regenerates the dropped
/// points byte-for-byte.
#[test]
fn truncated_rebuild_regenerates_identical_points() {
    let compressed = gzip(&random_bytes(8 * MIB as usize, 9));
    let mut index = Index::with_defaults(Cursor::new(compressed)).expect("init");

    index.build(0, 0).expect("full build");
    let original = snapshot(&index);
    assert!(original.len() >= 4, "need points on both sides of the cut");

    let cut = 4 * MIB;
    index.build(cut, 0).expect("rebuild from mid-file");
    let rebuilt = snapshot(&index);

    assert_eq!(original, rebuilt, "rebuild must reproduce the same points");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: configuration validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn undersized_window_is_rejected() {
    let opts = IndexOptions {
        window_size: 16_384,
        spacing: MIB,
        ..Default::default()
    };
    assert!(Index::new(Cursor::new(Vec::new()), opts).is_err());
}

#[test]
fn spacing_equal_to_window_is_rejected() {
    let opts = IndexOptions {
        window_size: MIN_WINDOW_SIZE,
        spacing: MIN_WINDOW_SIZE as u64,
        ..Default::default()
    };
    assert!(Index::new(Cursor::new(Vec::new()), opts).is_err());
}
