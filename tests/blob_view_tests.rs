//! Integration tests for trace blob ownership
//!
//! These tests validate that a blob's allocation is released exactly once,
//! exactly when the last view referencing it is dropped, across slicing,
//! copying, moving, threads and the chunk reader.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracefold::blob::{BlobRecycler, ReclaimedBlob, TraceBlob};
use tracefold::blob_view::TraceBlobView;
use tracefold::chunk_reader::ChunkReader;

/// Counts releases and keeps the reclaimed buffers around for inspection
#[derive(Default)]
struct ReleaseCounter {
    released: AtomicUsize,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl ReleaseCounter {
    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl BlobRecycler for ReleaseCounter {
    fn reclaim(&self, reclaimed: ReclaimedBlob) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.buffers.lock().unwrap().push(reclaimed.into_buffer());
    }
}

fn tracked_view(counter: &Arc<ReleaseCounter>, bytes: &[u8]) -> TraceBlobView {
    TraceBlobView::new(TraceBlob::copy_from(bytes).with_recycler(counter.clone()))
}

#[test]
fn test_released_when_last_slice_dropped() {
    let counter = Arc::new(ReleaseCounter::default());
    let view = tracked_view(&counter, b"packet-a|packet-b");

    let first = view.slice_off(0, 8);
    let second = view.slice_off(9, 8);
    drop(view);
    assert_eq!(counter.released(), 0);
    assert_eq!(first.data(), b"packet-a");

    drop(first);
    assert_eq!(counter.released(), 0);
    assert_eq!(second.data(), b"packet-b");

    drop(second);
    assert_eq!(counter.released(), 1);
    assert_eq!(counter.buffers.lock().unwrap()[0], b"packet-a|packet-b");
}

#[test]
fn test_move_and_take_do_not_double_release() {
    let counter = Arc::new(ReleaseCounter::default());
    let mut view = tracked_view(&counter, b"payload");

    let moved = view.take();
    drop(view);
    assert_eq!(counter.released(), 0);

    let stored = vec![moved];
    assert_eq!(stored[0].ref_count(), 1);
    drop(stored);
    assert_eq!(counter.released(), 1);
}

#[test]
fn test_copies_share_allocation() {
    let counter = Arc::new(ReleaseCounter::default());
    let view = tracked_view(&counter, b"0123456789");

    let copies: Vec<TraceBlobView> = (0..5).map(|_| view.copy()).collect();
    assert_eq!(view.ref_count(), 6);
    assert!(copies.iter().all(|copy| *copy == view));

    drop(copies);
    assert_eq!(view.ref_count(), 1);
    assert_eq!(counter.released(), 0);
    drop(view);
    assert_eq!(counter.released(), 1);
}

#[test]
fn test_equality_independent_of_slice_path() {
    let view = TraceBlobView::new(TraceBlob::copy_from(b"abcdefghijklmnop"));

    let direct = view.slice_off(4, 4);
    let nested = view.slice_off(2, 10).slice_off(2, 6).copy().slice_off(0, 4);
    let by_bytes = view.slice(&view.data()[4..8]);

    assert_eq!(direct, nested);
    assert_eq!(direct, by_bytes);
    assert_eq!(nested.data(), b"efgh");
}

#[test]
fn test_views_released_across_threads() {
    let counter = Arc::new(ReleaseCounter::default());
    let view = tracked_view(&counter, &[7u8; 4096]);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let slice = view.slice_off(i * 1024, 1024);
            thread::spawn(move || slice.data().iter().map(|&b| b as u64).sum::<u64>())
        })
        .collect();
    drop(view);

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 7 * 4096);
    assert_eq!(counter.released(), 1);
}

#[test]
fn test_chunk_reader_blobs_released_individually() {
    let counter = Arc::new(ReleaseCounter::default());
    let source: &[u8] = b"aaaabbbbcc";
    let reader = ChunkReader::new(source, 4)
        .unwrap()
        .with_recycler(counter.clone());

    let views: Vec<TraceBlobView> = reader.map(|view| view.unwrap()).collect();
    assert_eq!(views.len(), 3);
    assert_eq!(views[2].data(), b"cc");

    let kept = views[1].slice_off(1, 2);
    drop(views);
    assert_eq!(counter.released(), 2);

    assert_eq!(kept.data(), b"bb");
    drop(kept);
    assert_eq!(counter.released(), 3);
}

#[test]
#[should_panic(expected = "out of bounds")]
fn test_zero_length_range_checked_against_final_length() {
    // a zero-length view is valid at the end of a blob but not past it
    let _ = TraceBlobView::with_range(TraceBlob::copy_from(b"ab"), 3, Some(0));
}
