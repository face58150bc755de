// Per-sequence delta reconstruction

use super::resolver::CallstackResolver;
use super::sink::AllocationSink;
use super::stats::TrackerStats;
use super::types::{
    AbsoluteRow, CallsiteId, HeapProfileRow, Pid, ProfilePacket, SequenceId, SourceAllocation,
};
use crate::config::IngestConfig;
use fnv::FnvHashMap;
use std::collections::BTreeMap;

type PairKey = (Pid, CallsiteId);

/// Newest timestamp accepted for a pair and the records applied at it
#[derive(Debug, Default)]
struct PairHistory {
    last_timestamp: i64,
    applied: Vec<SourceAllocation>,
}

impl PairHistory {
    fn accept(&mut self, alloc: &SourceAllocation) {
        if alloc.timestamp > self.last_timestamp || self.applied.is_empty() {
            self.last_timestamp = alloc.timestamp;
            self.applied.clear();
        }
        self.applied.push(*alloc);
    }
}

#[derive(Debug, Default)]
struct SequenceState {
    pending_allocs: Vec<SourceAllocation>,
    prev_alloc: FnvHashMap<PairKey, AbsoluteRow>,
    prev_free: FnvHashMap<PairKey, AbsoluteRow>,
    history: FnvHashMap<PairKey, PairHistory>,
    prev_index: Option<u64>,
}

/// Knobs the reconstruction step needs from the tracker
struct Reconstruct<'a, R: ?Sized, S> {
    seq_id: SequenceId,
    resolver: &'a R,
    sink: &'a mut S,
    stats: &'a mut TrackerStats,
    drop_duplicates: bool,
}

impl SequenceState {
    fn add_allocation<R, S>(&mut self, alloc: &SourceAllocation, ctx: &mut Reconstruct<'_, R, S>)
    where
        R: CallstackResolver + ?Sized,
        S: AllocationSink,
    {
        let seq_id = ctx.seq_id;
        ctx.stats.records_committed += 1;

        let Some(callsite_id) = ctx.resolver.resolve(seq_id, alloc.callstack_id) else {
            tracing::warn!(
                seq_id,
                pid = alloc.pid,
                callstack_id = alloc.callstack_id,
                "Unresolved callstack id, dropping heap profile record"
            );
            ctx.stats.invalid_callstacks += 1;
            return;
        };
        let key = (alloc.pid, callsite_id);

        if let Some(history) = self.history.get(&key) {
            if alloc.timestamp < history.last_timestamp {
                tracing::warn!(
                    seq_id,
                    pid = alloc.pid,
                    %callsite_id,
                    timestamp = alloc.timestamp,
                    last_timestamp = history.last_timestamp,
                    "Non-monotonic heap profile timestamp, dropping record"
                );
                ctx.stats.timestamp_regressions += 1;
                return;
            }
            if ctx.drop_duplicates
                && alloc.timestamp == history.last_timestamp
                && history.applied.contains(alloc)
            {
                tracing::debug!(
                    seq_id,
                    pid = alloc.pid,
                    %callsite_id,
                    timestamp = alloc.timestamp,
                    "Duplicate heap profile record"
                );
                ctx.stats.duplicate_records += 1;
                return;
            }
        }

        // nothing to emit, but the timestamp still counts
        if alloc.is_zero_delta() {
            self.history.entry(key).or_default().accept(alloc);
            return;
        }

        let prev_alloc = self.prev_alloc.get(&key).copied().unwrap_or_default();
        let prev_free = self.prev_free.get(&key).copied().unwrap_or_default();
        let (Some(alloc_row), Some(free_row)) = (
            prev_alloc.advance(alloc.timestamp, alloc.self_allocated, alloc.alloc_count),
            prev_free.advance(alloc.timestamp, alloc.self_freed, alloc.free_count),
        ) else {
            tracing::warn!(
                seq_id,
                pid = alloc.pid,
                %callsite_id,
                "Heap profile totals overflow, dropping record"
            );
            ctx.stats.counter_overflows += 1;
            return;
        };

        if !alloc_row.same_totals(&prev_alloc) {
            ctx.sink
                .append(HeapProfileRow::allocation(alloc.pid, callsite_id, &alloc_row));
            ctx.stats.rows_emitted += 1;
            self.prev_alloc.insert(key, alloc_row);
        }
        if !free_row.same_totals(&prev_free) {
            ctx.sink
                .append(HeapProfileRow::free(alloc.pid, callsite_id, &free_row));
            ctx.stats.rows_emitted += 1;
            self.prev_free.insert(key, free_row);
        }

        self.history.entry(key).or_default().accept(alloc);
    }
}

/// Reconstructs absolute heap profile rows from per-interval deltas
///
/// # Example
/// ```
/// use tracefold::heap_profile::{
///     AllocationTable, CallsiteId, HeapProfileTracker, InternedCallstacks, SourceAllocation,
/// };
///
/// let mut callstacks = InternedCallstacks::new();
/// callstacks.insert(1, 7, CallsiteId(0));
///
/// let mut tracker = HeapProfileTracker::new(AllocationTable::new());
/// tracker.set_profile_packet_index(1, 0);
/// tracker.store_allocation(1, SourceAllocation::new(42, 10, 7).with_allocated(100, 1));
/// tracker.store_allocation(1, SourceAllocation::new(42, 20, 7).with_allocated(50, 1));
/// tracker.finalize_profile(1, &callstacks);
///
/// let last = tracker.sink().rows().last().unwrap();
/// assert_eq!((last.allocated_bytes, last.allocated_count), (150, 2));
/// ```
#[derive(Debug)]
pub struct HeapProfileTracker<S> {
    sequences: BTreeMap<SequenceId, SequenceState>,
    sink: S,
    config: IngestConfig,
    stats: TrackerStats,
}

impl<S: AllocationSink> HeapProfileTracker<S> {
    /// Create a tracker writing to `sink` with the default configuration
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, IngestConfig::default())
    }

    pub fn with_config(sink: S, config: IngestConfig) -> Self {
        Self {
            sequences: BTreeMap::new(),
            sink,
            config,
            stats: TrackerStats::default(),
        }
    }

    /// Record the index of the profile packet about to be stored.
    ///
    /// Indices must increase by exactly one per packet; the first packet of a
    /// sequence must carry `config.first_packet_index`. Anything else means
    /// packets were lost or replayed. The gap is reported and processing
    /// continues.
    pub fn set_profile_packet_index(&mut self, seq_id: SequenceId, index: u64) {
        let state = self.sequences.entry(seq_id).or_default();
        let expected = match state.prev_index {
            Some(prev) => prev.checked_add(1),
            None => Some(self.config.first_packet_index),
        };

        if expected != Some(index) {
            match state.prev_index {
                Some(prev) => tracing::warn!(
                    seq_id,
                    prev,
                    index,
                    "Missing heap profile packets between {} and {}",
                    prev,
                    index
                ),
                None => tracing::warn!(
                    seq_id,
                    index,
                    expected = self.config.first_packet_index,
                    "Invalid first heap profile packet index"
                ),
            }
            self.stats.missing_packets += 1;
        }
        state.prev_index = Some(index);
    }

    /// Queue a record for the current dump. Nothing is emitted until commit.
    pub fn store_allocation(&mut self, seq_id: SequenceId, alloc: SourceAllocation) {
        self.sequences
            .entry(seq_id)
            .or_default()
            .pending_allocs
            .push(alloc);
        self.stats.records_stored += 1;
    }

    /// Record a packet's index and queue all of its records
    pub fn ingest_packet(&mut self, seq_id: SequenceId, packet: ProfilePacket) {
        self.set_profile_packet_index(seq_id, packet.index);
        for alloc in packet.allocations {
            self.store_allocation(seq_id, alloc);
        }
    }

    /// Drain and reconstruct the pending records of `seq_id` without ending
    /// the dump. Tests use this; production code calls `finalize_profile`.
    pub fn commit_allocations<R>(&mut self, seq_id: SequenceId, resolver: &R)
    where
        R: CallstackResolver + ?Sized,
    {
        let Some(state) = self.sequences.get_mut(&seq_id) else {
            return;
        };

        let mut ctx = Reconstruct {
            seq_id,
            resolver,
            sink: &mut self.sink,
            stats: &mut self.stats,
            drop_duplicates: self.config.drop_duplicate_records,
        };

        let mut pending = std::mem::take(&mut state.pending_allocs);
        for alloc in pending.drain(..) {
            state.add_allocation(&alloc, &mut ctx);
        }
        // reuse the allocation while the dump is still open
        state.pending_allocs = pending;
    }

    /// Commit the pending records of a completed dump.
    ///
    /// The per-pair rows and the packet index survive, so the next dump's
    /// deltas and gap check continue from here.
    pub fn finalize_profile<R>(&mut self, seq_id: SequenceId, resolver: &R)
    where
        R: CallstackResolver + ?Sized,
    {
        let rows_before = self.stats.rows_emitted;
        self.commit_allocations(seq_id, resolver);

        if let Some(state) = self.sequences.get_mut(&seq_id) {
            state.pending_allocs.shrink_to(0);
            self.stats.profiles_finalized += 1;
            tracing::debug!(
                seq_id,
                rows = self.stats.rows_emitted - rows_before,
                pairs = state.prev_alloc.len().max(state.prev_free.len()),
                "Finalized heap profile dump"
            );
        }
    }

    /// Number of records waiting for commit
    pub fn pending_len(&self, seq_id: SequenceId) -> usize {
        self.sequences
            .get(&seq_id)
            .map_or(0, |state| state.pending_allocs.len())
    }

    /// Number of sequences with state
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn last_profile_packet_index(&self, seq_id: SequenceId) -> Option<u64> {
        self.sequences.get(&seq_id).and_then(|state| state.prev_index)
    }

    /// Last emitted allocation totals for a pair
    pub fn previous_allocation(
        &self,
        seq_id: SequenceId,
        pid: Pid,
        callsite_id: CallsiteId,
    ) -> Option<AbsoluteRow> {
        self.sequences
            .get(&seq_id)
            .and_then(|state| state.prev_alloc.get(&(pid, callsite_id)).copied())
    }

    /// Last emitted free totals for a pair
    pub fn previous_free(
        &self,
        seq_id: SequenceId,
        pid: Pid,
        callsite_id: CallsiteId,
    ) -> Option<AbsoluteRow> {
        self.sequences
            .get(&seq_id)
            .and_then(|state| state.prev_free.get(&(pid, callsite_id)).copied())
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
