#![no_main]

use libfuzzer_sys::fuzz_target;
use tracefold::blob::TraceBlob;
use tracefold::blob_view::TraceBlobView;

fuzz_target!(|data: &[u8]| {
    // First byte picks how many cut points follow; the rest is the blob
    let Some((&cuts, rest)) = data.split_first() else {
        return;
    };
    let cuts = (cuts as usize % 8).min(rest.len() / 2);
    let (offsets, payload) = rest.split_at(cuts * 2);

    let root = TraceBlobView::new(TraceBlob::copy_from(payload));
    let mut view = root.copy();

    // Any in-bounds cut must succeed and stay inside its parent
    for pair in offsets.chunks_exact(2) {
        let start = pair[0] as usize % (view.len() + 1);
        let len = pair[1] as usize % (view.len() - start + 1);
        let next = view.slice_off(start, len);
        assert_eq!(next.data(), &view.data()[start..start + len]);
        view = next;
    }

    assert_eq!(root.slice_off(view.offset(), view.len()), view);
});
