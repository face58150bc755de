// Records flowing into and out of the heap profile tracker

use std::fmt;

/// Identifier of one logical packet stream
pub type SequenceId = u32;

/// Process id as reported by the profiler
pub type Pid = u64;

/// Interned callstack id, only meaningful within its sequence
pub type SourceCallstackId = u64;

/// Canonical callstack id assigned by the interning resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallsiteId(pub u32);

impl fmt::Display for CallsiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callsite#{}", self.0)
    }
}

/// One decoded interval record for a (process, callstack) pair.
///
/// All four counters are deltas since the previous report for the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceAllocation {
    pub pid: Pid,
    /// Already converted to trace time by the sorter, hence signed
    pub timestamp: i64,
    pub callstack_id: SourceCallstackId,
    pub self_allocated: u64,
    pub self_freed: u64,
    pub alloc_count: u64,
    pub free_count: u64,
}

impl SourceAllocation {
    /// Record with all deltas set to zero
    pub fn new(pid: Pid, timestamp: i64, callstack_id: SourceCallstackId) -> Self {
        Self {
            pid,
            timestamp,
            callstack_id,
            ..Self::default()
        }
    }

    pub fn with_allocated(mut self, bytes: u64, count: u64) -> Self {
        self.self_allocated = bytes;
        self.alloc_count = count;
        self
    }

    pub fn with_freed(mut self, bytes: u64, count: u64) -> Self {
        self.self_freed = bytes;
        self.free_count = count;
        self
    }

    /// True when the record reports no activity at all
    pub fn is_zero_delta(&self) -> bool {
        self.self_allocated == 0 && self.alloc_count == 0 && self.self_freed == 0 && self.free_count == 0
    }
}

/// Total-to-date statistics for one side (allocations or frees) of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbsoluteRow {
    pub timestamp: i64,
    pub size: u64,
    pub count: u64,
}

impl AbsoluteRow {
    /// Row advanced by one interval, or `None` if a total would overflow
    pub fn advance(&self, timestamp: i64, size: u64, count: u64) -> Option<AbsoluteRow> {
        Some(AbsoluteRow {
            timestamp,
            size: self.size.checked_add(size)?,
            count: self.count.checked_add(count)?,
        })
    }

    /// Totals match, regardless of timestamp
    pub fn same_totals(&self, other: &AbsoluteRow) -> bool {
        self.size == other.size && self.count == other.count
    }
}

/// Which mapping a stored row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Allocation,
    Free,
}

/// Row handed to the storage sink.
///
/// Allocation rows carry the allocated totals and zero freed fields; free
/// rows the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapProfileRow {
    pub kind: RowKind,
    pub pid: Pid,
    pub callsite_id: CallsiteId,
    pub timestamp: i64,
    pub allocated_bytes: u64,
    pub allocated_count: u64,
    pub freed_bytes: u64,
    pub freed_count: u64,
}

impl HeapProfileRow {
    pub fn allocation(pid: Pid, callsite_id: CallsiteId, row: &AbsoluteRow) -> Self {
        Self {
            kind: RowKind::Allocation,
            pid,
            callsite_id,
            timestamp: row.timestamp,
            allocated_bytes: row.size,
            allocated_count: row.count,
            freed_bytes: 0,
            freed_count: 0,
        }
    }

    pub fn free(pid: Pid, callsite_id: CallsiteId, row: &AbsoluteRow) -> Self {
        Self {
            kind: RowKind::Free,
            pid,
            callsite_id,
            timestamp: row.timestamp,
            allocated_bytes: 0,
            allocated_count: 0,
            freed_bytes: row.size,
            freed_count: row.count,
        }
    }

    /// The (timestamp, bytes, count) triple for this row's side
    pub fn absolute(&self) -> AbsoluteRow {
        match self.kind {
            RowKind::Allocation => AbsoluteRow {
                timestamp: self.timestamp,
                size: self.allocated_bytes,
                count: self.allocated_count,
            },
            RowKind::Free => AbsoluteRow {
                timestamp: self.timestamp,
                size: self.freed_bytes,
                count: self.freed_count,
            },
        }
    }
}

/// One profile packet: its stream index plus the records it carried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePacket {
    pub index: u64,
    pub allocations: Vec<SourceAllocation>,
}

impl ProfilePacket {
    pub fn new(index: u64, allocations: Vec<SourceAllocation>) -> Self {
        Self { index, allocations }
    }
}
