// Callstack interning lookup

use super::types::{CallsiteId, SequenceId, SourceCallstackId};
use fnv::FnvHashMap;

/// Maps a sequence-scoped interned callstack id to its canonical callsite.
///
/// The tracker consults the resolver once per committed record and never
/// mutates it. `None` means the interning data is missing, usually because
/// the packet that defined it was lost.
pub trait CallstackResolver {
    fn resolve(&self, seq_id: SequenceId, callstack_id: SourceCallstackId) -> Option<CallsiteId>;
}

impl<F> CallstackResolver for F
where
    F: Fn(SequenceId, SourceCallstackId) -> Option<CallsiteId>,
{
    fn resolve(&self, seq_id: SequenceId, callstack_id: SourceCallstackId) -> Option<CallsiteId> {
        self(seq_id, callstack_id)
    }
}

/// In-memory interning table
///
/// # Example
/// ```
/// use tracefold::heap_profile::{CallsiteId, CallstackResolver, InternedCallstacks};
///
/// let mut callstacks = InternedCallstacks::new();
/// callstacks.insert(1, 7, CallsiteId(0));
///
/// assert_eq!(callstacks.resolve(1, 7), Some(CallsiteId(0)));
/// assert_eq!(callstacks.resolve(2, 7), None);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InternedCallstacks {
    entries: FnvHashMap<(SequenceId, SourceCallstackId), CallsiteId>,
}

impl InternedCallstacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interned callstack, returning the previous mapping if any
    pub fn insert(
        &mut self,
        seq_id: SequenceId,
        callstack_id: SourceCallstackId,
        callsite_id: CallsiteId,
    ) -> Option<CallsiteId> {
        self.entries.insert((seq_id, callstack_id), callsite_id)
    }

    /// Drop all interning state of one sequence (e.g. on producer restart)
    pub fn clear_sequence(&mut self, seq_id: SequenceId) {
        self.entries.retain(|&(seq, _), _| seq != seq_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CallstackResolver for InternedCallstacks {
    fn resolve(&self, seq_id: SequenceId, callstack_id: SourceCallstackId) -> Option<CallsiteId> {
        self.entries.get(&(seq_id, callstack_id)).copied()
    }
}
