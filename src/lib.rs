//! Tracefold - ingestion-time data layer for trace processing
//!
//! This library provides the two pieces every later pipeline stage builds on:
//!
//! - **Buffer ownership**: [`blob::TraceBlob`] (owned, writable, move-only) and
//!   [`blob_view::TraceBlobView`] (read-only, reference-counted views that can
//!   be sliced and fanned out to several stages without copying).
//! - **Heap profile reconstruction**: [`heap_profile::HeapProfileTracker`]
//!   folds per-interval allocation deltas back into absolute per-callsite
//!   totals, tolerating lost, reordered and redelivered packets.

pub mod blob;
pub mod blob_view;
pub mod chunk_reader;
pub mod config;
pub mod heap_profile;
