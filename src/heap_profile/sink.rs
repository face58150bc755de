// Storage side of the heap profile tracker

use super::types::{CallsiteId, HeapProfileRow, Pid, RowKind};

/// Receives reconstructed absolute rows.
///
/// Called once per emitted row, for allocation and free rows independently.
pub trait AllocationSink {
    fn append(&mut self, row: HeapProfileRow);
}

impl AllocationSink for Vec<HeapProfileRow> {
    fn append(&mut self, row: HeapProfileRow) {
        self.push(row);
    }
}

impl<S: AllocationSink + ?Sized> AllocationSink for &mut S {
    fn append(&mut self, row: HeapProfileRow) {
        (**self).append(row);
    }
}

/// Append-only in-memory table of emitted rows
#[derive(Debug, Default, Clone)]
pub struct AllocationTable {
    rows: Vec<HeapProfileRow>,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[HeapProfileRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one kind, in insertion order
    pub fn rows_of_kind(&self, kind: RowKind) -> impl Iterator<Item = &HeapProfileRow> + '_ {
        self.rows.iter().filter(move |row| row.kind == kind)
    }

    /// All rows of a (process, callsite) pair, in insertion order
    pub fn rows_for(
        &self,
        pid: Pid,
        callsite_id: CallsiteId,
    ) -> impl Iterator<Item = &HeapProfileRow> + '_ {
        self.rows
            .iter()
            .filter(move |row| row.pid == pid && row.callsite_id == callsite_id)
    }

    /// Most recent row of `kind` for a pair
    pub fn latest(&self, kind: RowKind, pid: Pid, callsite_id: CallsiteId) -> Option<&HeapProfileRow> {
        self.rows_for(pid, callsite_id)
            .filter(|row| row.kind == kind)
            .last()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl AllocationSink for AllocationTable {
    fn append(&mut self, row: HeapProfileRow) {
        self.rows.push(row);
    }
}
