// Diagnostic counters for heap profile reconstruction

/// Heap profile tracker statistics
///
/// Every recoverable data problem increments exactly one counter and drops
/// at most one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Records queued through `store_allocation`
    pub records_stored: u64,
    /// Records drained by commit or finalize
    pub records_committed: u64,
    /// Rows appended to the sink (allocation and free rows together)
    pub rows_emitted: u64,
    /// Dumps completed through `finalize_profile`
    pub profiles_finalized: u64,
    /// Packet index gaps or an unexpected first index
    pub missing_packets: u64,
    /// Records whose callstack id could not be resolved
    pub invalid_callstacks: u64,
    /// Records older than the stored row for their pair
    pub timestamp_regressions: u64,
    /// Records that would overflow an absolute total
    pub counter_overflows: u64,
    /// Records identical to the last one applied for their pair
    pub duplicate_records: u64,
}

impl TrackerStats {
    /// Committed records that were discarded
    pub fn dropped_records(&self) -> u64 {
        self.invalid_callstacks
            + self.timestamp_regressions
            + self.counter_overflows
            + self.duplicate_records
    }

    /// Calculate drop rate over committed records (0.0 to 1.0)
    pub fn drop_rate(&self) -> f64 {
        if self.records_committed == 0 {
            0.0
        } else {
            self.dropped_records() as f64 / self.records_committed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_rate_calculation() {
        let stats = TrackerStats {
            records_committed: 100,
            invalid_callstacks: 2,
            timestamp_regressions: 1,
            duplicate_records: 2,
            ..Default::default()
        };

        assert_eq!(stats.dropped_records(), 5);
        assert_eq!(stats.drop_rate(), 0.05);
    }

    #[test]
    fn test_drop_rate_without_records() {
        assert_eq!(TrackerStats::default().drop_rate(), 0.0);
    }
}
