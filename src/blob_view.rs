//! Read-only, reference-counted views over trace blobs
//!
//! Trace chunks are large (megabytes) and flow through several pipeline
//! stages (read → sort → decode → interpret). Each stage needs to keep some
//! sub-range of a chunk alive, for a different amount of time. A
//! [`TraceBlobView`] is the handle every stage receives:
//!
//! ```text
//!   TraceBlob (owned, writable)
//!        │  TraceBlobView::new(blob)   ← ownership moves into Arc<TraceBlob>
//!        ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ Arc<TraceBlob>  [ packet 0 | packet 1 | packet 2 | ...  ] │
//!   └───────────────────────────────────────────────────────────┘
//!        ▲                 ▲               ▲
//!   view(0..len)     slice_off(a, n)   slice(&bytes[b..c])
//! ```
//!
//! Every view holds one strong reference. The blob is released when the last
//! view is dropped; dropping is the only deallocation path.
//!
//! Range violations are programming errors in the producer that computed the
//! offsets, not malformed trace data, so they panic instead of returning an
//! error. Ranges are checked once, at construction, against the final
//! computed length.

use crate::blob::TraceBlob;
use std::fmt;
use std::sync::Arc;

/// Largest range a single view can address.
pub const MAX_VIEW_LENGTH: usize = u32::MAX as usize;

/// Read-only handle on a sub-range of a shared [`TraceBlob`].
///
/// Copies are explicit ([`TraceBlobView::copy`] or `clone()`); moving a view
/// transfers its reference without touching the count.
///
/// # Example
/// ```
/// use tracefold::blob::TraceBlob;
/// use tracefold::blob_view::TraceBlobView;
///
/// let view = TraceBlobView::new(TraceBlob::copy_from(b"header|payload"));
/// let payload = view.slice_off(7, 7);
///
/// assert_eq!(payload.data(), b"payload");
/// assert_eq!(view.ref_count(), 2);
/// drop(view);
/// assert_eq!(payload.ref_count(), 1);
/// ```
#[derive(Default)]
pub struct TraceBlobView {
    blob: Option<Arc<TraceBlob>>,
    offset: usize,
    length: usize,
}

impl TraceBlobView {
    /// Take ownership of the whole blob
    pub fn new(blob: TraceBlob) -> Self {
        Self::with_range(blob, 0, None)
    }

    /// Take ownership of `blob`, viewing `offset..offset + length`.
    ///
    /// `length: None` means "up to the end of the blob".
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit inside the blob or exceeds
    /// [`MAX_VIEW_LENGTH`].
    pub fn with_range(blob: TraceBlob, offset: usize, length: Option<usize>) -> Self {
        let size = blob.size();
        assert!(
            offset <= size,
            "view offset {offset} out of bounds for blob of {size} bytes"
        );
        let length = length.unwrap_or(size - offset);
        assert!(
            length <= MAX_VIEW_LENGTH,
            "view length {length} exceeds maximum of {MAX_VIEW_LENGTH} bytes"
        );
        assert!(
            offset
                .checked_add(length)
                .is_some_and(|end| end <= size),
            "view range {offset}+{length} out of bounds for blob of {size} bytes"
        );

        Self {
            blob: Some(Arc::new(blob)),
            offset,
            length,
        }
    }

    /// Narrower view of `offset..offset + length`, relative to this view.
    ///
    /// # Panics
    ///
    /// Panics if the requested range is not contained in this view.
    pub fn slice_off(&self, offset: usize, length: usize) -> Self {
        assert!(
            offset
                .checked_add(length)
                .is_some_and(|end| end <= self.length),
            "slice {offset}+{length} out of bounds for view of {} bytes",
            self.length
        );

        Self {
            blob: self.blob.clone(),
            offset: self.offset + offset,
            length,
        }
    }

    /// Narrower view covering `sub`, which must be a sub-slice of
    /// [`TraceBlobView::data`].
    ///
    /// This is the form decoders use: they walk `view.data()` and hand back
    /// the byte range of a field.
    ///
    /// # Panics
    ///
    /// Panics if `sub` does not point inside this view.
    pub fn slice(&self, sub: &[u8]) -> Self {
        let base = self.data().as_ptr() as usize;
        let start = sub.as_ptr() as usize;
        assert!(
            start >= base && start - base <= self.length,
            "slice start is outside the view"
        );
        self.slice_off(start - base, sub.len())
    }

    /// Explicit alias of this view sharing the same allocation
    pub fn copy(&self) -> Self {
        self.slice_off(0, self.length)
    }

    /// Move the view out, leaving an empty view in its place
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn data(&self) -> &[u8] {
        match &self.blob {
            Some(blob) => &blob.data()[self.offset..self.offset + self.length],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn size(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of this view inside its blob
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of live handles sharing this view's allocation (0 when empty)
    pub fn ref_count(&self) -> usize {
        self.blob.as_ref().map_or(0, Arc::strong_count)
    }

    /// Whether this view holds an allocation at all
    pub fn has_blob(&self) -> bool {
        self.blob.is_some()
    }

    fn start_ptr(&self) -> *const u8 {
        self.data().as_ptr()
    }
}

impl Clone for TraceBlobView {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl PartialEq for TraceBlobView {
    fn eq(&self, other: &Self) -> bool {
        let same_blob = match (&self.blob, &other.blob) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_blob && self.length == other.length && self.start_ptr() == other.start_ptr()
    }
}

impl Eq for TraceBlobView {}

impl AsRef<[u8]> for TraceBlobView {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl From<TraceBlob> for TraceBlobView {
    fn from(blob: TraceBlob) -> Self {
        Self::new(blob)
    }
}

impl fmt::Debug for TraceBlobView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceBlobView")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> TraceBlobView {
        TraceBlobView::new(TraceBlob::copy_from(b"0123456789"))
    }

    #[test]
    fn test_new_views_whole_blob() {
        let view = sample_view();
        assert_eq!(view.len(), 10);
        assert_eq!(view.offset(), 0);
        assert_eq!(view.data(), b"0123456789");
        assert_eq!(view.ref_count(), 1);
    }

    #[test]
    fn test_with_range() {
        let view = TraceBlobView::with_range(TraceBlob::copy_from(b"0123456789"), 2, Some(3));
        assert_eq!(view.data(), b"234");

        let tail = TraceBlobView::with_range(TraceBlob::copy_from(b"0123456789"), 7, None);
        assert_eq!(tail.data(), b"789");
    }

    #[test]
    fn test_zero_length_at_end() {
        let view = TraceBlobView::with_range(TraceBlob::copy_from(b"abc"), 3, Some(0));
        assert!(view.is_empty());
        assert!(view.has_blob());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_with_range_out_of_bounds_panics() {
        let _ = TraceBlobView::with_range(TraceBlob::copy_from(b"abc"), 2, Some(2));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_with_range_offset_past_end_panics() {
        let _ = TraceBlobView::with_range(TraceBlob::copy_from(b"abc"), 4, None);
    }

    #[test]
    fn test_slice_off_shares_allocation() {
        let view = sample_view();
        let inner = view.slice_off(3, 4);
        assert_eq!(inner.data(), b"3456");
        assert_eq!(inner.offset(), 3);
        assert_eq!(view.ref_count(), 2);

        let nested = inner.slice_off(1, 2);
        assert_eq!(nested.data(), b"45");
        assert_eq!(nested.offset(), 4);
        assert_eq!(view.ref_count(), 3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_slice_off_past_view_panics() {
        let view = sample_view().slice_off(0, 4);
        let _ = view.slice_off(2, 3);
    }

    #[test]
    fn test_slice_by_subslice() {
        let view = sample_view();
        let field = &view.data()[5..8];
        let sliced = view.slice(field);
        assert_eq!(sliced.data(), b"567");
        assert_eq!(sliced, view.slice_off(5, 3));
    }

    #[test]
    #[should_panic(expected = "outside the view")]
    fn test_slice_foreign_bytes_panics() {
        let view = sample_view();
        let other = vec![0u8; 4];
        let _ = view.slice(&other);
    }

    #[test]
    fn test_equality_is_identity_not_content() {
        let a = TraceBlobView::new(TraceBlob::copy_from(b"same"));
        let b = TraceBlobView::new(TraceBlob::copy_from(b"same"));
        assert_eq!(a.data(), b.data());
        assert_ne!(a, b);
        assert_eq!(a, a.copy());
        assert_ne!(a, a.slice_off(0, 3));
    }

    #[test]
    fn test_take_leaves_empty_view() {
        let mut view = sample_view();
        let moved = view.take();
        assert!(!view.has_blob());
        assert_eq!(view.ref_count(), 0);
        assert!(view.data().is_empty());
        assert_eq!(moved.ref_count(), 1);
    }

    #[test]
    fn test_default_views_are_equal() {
        let a = TraceBlobView::default();
        let b = TraceBlobView::default();
        assert_eq!(a, b);
        assert_eq!(a.ref_count(), 0);
        assert_eq!(a.slice_off(0, 0), b);
    }

    #[test]
    fn test_views_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TraceBlobView>();
    }
}
