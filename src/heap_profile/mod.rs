// Heap profile reconstruction
//
// Heap profilers report, per (process, callstack) pair, only what was
// allocated and freed since their previous report. This module folds those
// per-interval deltas back into absolute totals and writes one row per
// change to an allocation sink.
//
// Records arrive per sequence (one logical packet stream). They are queued by
// `store_allocation` and only reconstructed when a dump is committed or
// finalized, after the callstack interning data for that dump is complete.
//
// Recoverable data problems (lost interning packets, reordered or duplicated
// packets, packet index gaps) drop the single affected record, are logged
// through `tracing` and are counted in `TrackerStats`. They never stop
// ingestion.

mod resolver;
mod sink;
mod stats;
mod tracker;
mod types;

pub use resolver::{CallstackResolver, InternedCallstacks};
pub use sink::{AllocationSink, AllocationTable};
pub use stats::TrackerStats;
pub use tracker::HeapProfileTracker;
pub use types::{
    AbsoluteRow, CallsiteId, HeapProfileRow, Pid, ProfilePacket, RowKind, SequenceId,
    SourceAllocation, SourceCallstackId,
};
