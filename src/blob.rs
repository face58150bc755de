//! Owned, writable trace buffers
//!
//! A [`TraceBlob`] is the first stage of every raw chunk that enters the
//! ingestion pipeline. It is writable and move-only: there is exactly one
//! live `TraceBlob` per backing allocation. Once the producer is done writing,
//! the blob is consumed by value into a [`TraceBlobView`](crate::blob_view::TraceBlobView),
//! at which point it becomes a shared, reference-counted allocation.
//!
//! Blobs may carry a [`BlobRecycler`]. The recycler is notified exactly once,
//! when the last owner of the allocation (the blob itself, or the last view
//! derived from it) is dropped.

use std::fmt;
use std::mem;
use std::sync::Arc;

/// Receives the backing storage of a blob once its last owner is gone.
///
/// Implementations run on the `Drop` path of whichever thread released the
/// last reference, so `reclaim` must not panic.
pub trait BlobRecycler: Send + Sync + 'static {
    /// Called once per blob, after the last owner was dropped.
    fn reclaim(&self, reclaimed: ReclaimedBlob);
}

/// Backing storage handed to a [`BlobRecycler`].
#[derive(Debug)]
pub struct ReclaimedBlob {
    buffer: Vec<u8>,
}

impl ReclaimedBlob {
    fn new(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    /// Logical size of the released blob in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Capacity of the released allocation in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Consume the reclaim notice and return the buffer for reuse
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

/// Writable, move-only block of trace bytes.
///
/// `TraceBlob` deliberately implements neither `Clone` nor `Copy`: duplicating
/// a multi-megabyte chunk must never happen implicitly.
///
/// # Example
/// ```
/// use tracefold::blob::TraceBlob;
///
/// let mut blob = TraceBlob::allocate(4);
/// blob.data_mut().copy_from_slice(b"heap");
/// assert_eq!(blob.size(), 4);
/// assert_eq!(blob.data(), b"heap");
/// ```
pub struct TraceBlob {
    data: Vec<u8>,
    recycler: Option<Arc<dyn BlobRecycler>>,
}

impl TraceBlob {
    /// Allocate a zero-filled blob of `size` bytes
    pub fn allocate(size: usize) -> Self {
        Self::take_ownership(vec![0; size])
    }

    /// Allocate a blob holding a copy of `src`
    pub fn copy_from(src: &[u8]) -> Self {
        Self::take_ownership(src.to_vec())
    }

    /// Wrap an existing buffer without copying it
    pub fn take_ownership(data: Vec<u8>) -> Self {
        Self {
            data,
            recycler: None,
        }
    }

    /// Attach a recycler that receives the buffer when the last owner drops
    pub fn with_recycler(mut self, recycler: Arc<dyn BlobRecycler>) -> Self {
        self.recycler = Some(recycler);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether a recycler will be notified on release
    pub fn has_recycler(&self) -> bool {
        self.recycler.is_some()
    }
}

impl Drop for TraceBlob {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            recycler.reclaim(ReclaimedBlob::new(mem::take(&mut self.data)));
        }
    }
}

impl fmt::Debug for TraceBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceBlob")
            .field("size", &self.data.len())
            .field("recycler", &self.recycler.is_some())
            .finish()
    }
}

impl From<Vec<u8>> for TraceBlob {
    fn from(data: Vec<u8>) -> Self {
        Self::take_ownership(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRecycler {
        reclaimed: AtomicUsize,
        bytes: AtomicUsize,
    }

    impl BlobRecycler for CountingRecycler {
        fn reclaim(&self, reclaimed: ReclaimedBlob) {
            self.reclaimed.fetch_add(1, Ordering::SeqCst);
            self.bytes.fetch_add(reclaimed.size(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_allocate_is_zeroed() {
        let blob = TraceBlob::allocate(16);
        assert_eq!(blob.size(), 16);
        assert!(blob.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_from_and_write() {
        let mut blob = TraceBlob::copy_from(b"abcd");
        blob.data_mut()[0] = b'z';
        assert_eq!(blob.data(), b"zbcd");
    }

    #[test]
    fn test_empty_blob() {
        let blob = TraceBlob::take_ownership(Vec::new());
        assert!(blob.is_empty());
        assert_eq!(blob.size(), 0);
    }

    #[test]
    fn test_recycler_called_on_drop() {
        let recycler = Arc::new(CountingRecycler::default());
        let blob = TraceBlob::allocate(32).with_recycler(recycler.clone());
        assert!(blob.has_recycler());
        drop(blob);

        assert_eq!(recycler.reclaimed.load(Ordering::SeqCst), 1);
        assert_eq!(recycler.bytes.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_move_does_not_release() {
        let recycler = Arc::new(CountingRecycler::default());
        let blob = TraceBlob::allocate(8).with_recycler(recycler.clone());
        let moved = blob;
        assert_eq!(recycler.reclaimed.load(Ordering::SeqCst), 0);
        drop(moved);
        assert_eq!(recycler.reclaimed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reclaimed_buffer_reusable() {
        let reclaimed = ReclaimedBlob::new(Vec::with_capacity(64));
        assert!(reclaimed.capacity() >= 64);
        let buffer = reclaimed.into_buffer();
        assert!(buffer.is_empty());
    }
}
