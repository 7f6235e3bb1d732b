//! Bounded change log.
//!
//! Holds the most recent `capacity` records. Versions in the log are always
//! a contiguous run ending at the newest appended version; eviction only
//! ever removes from the front.

use std::collections::VecDeque;

use crate::change::{ChangeRecord, DeltaResult};

/// Default number of retained records.
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Ordered, capacity-bounded sequence of change records.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    records: VecDeque<ChangeRecord>,
    capacity: usize,
}

impl ChangeLog {
    /// Create an empty log. A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest ones beyond capacity.
    ///
    /// Returns the number of evicted records.
    pub fn push(&mut self, record: ChangeRecord) -> usize {
        debug_assert!(
            self.records
                .back()
                .map_or(true, |last| last.version + 1 == record.version),
            "change log versions must be contiguous"
        );
        self.records.push_back(record);

        let mut evicted = 0;
        while self.records.len() > self.capacity {
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Oldest retained version, if any record is retained.
    pub fn min_retained(&self) -> Option<u64> {
        self.records.front().map(|r| r.version)
    }

    /// Newest retained version.
    pub fn max_retained(&self) -> Option<u64> {
        self.records.back().map(|r| r.version)
    }

    /// Resolve what a caller at `known` needs to reach `current`.
    ///
    /// `current` is the ledger version the log was last appended at (or the
    /// restored version when the log is still empty).
    pub fn changes_since(&self, known: u64, current: u64) -> DeltaResult {
        if known == current {
            return DeltaResult::UpToDate;
        }
        if known > current {
            return DeltaResult::SnapshotRequired {
                new_version: current,
            };
        }

        let Some(min) = self.min_retained() else {
            return DeltaResult::SnapshotRequired {
                new_version: current,
            };
        };
        // `known` must be at most one behind the oldest record, otherwise
        // something between them was evicted.
        if known + 1 < min {
            return DeltaResult::SnapshotRequired {
                new_version: current,
            };
        }

        let skip = (known + 1 - min) as usize;
        let changes: Vec<ChangeRecord> = self.records.iter().skip(skip).cloned().collect();
        DeltaResult::Delta {
            changes,
            new_version: current,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}
