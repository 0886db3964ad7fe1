//! Recency Tracker Module
//!
//! Maps each live key to its last access, used to pick eviction victims.

use std::collections::HashMap;
use std::time::Instant;

// == Recency Record ==
/// Last access of one key.
///
/// `seq` is stamped from the tracker's own counter on every access, so two
/// records never compare equal even when the clock does not advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RecencyRecord {
    pub last_access: Instant,
    seq: u64,
}

// == Recency Tracker ==
/// Tracks last-access order for LRU eviction.
///
/// Every operation is O(1) except ranking, which sorts the records once.
#[derive(Debug, Default)]
pub(crate) struct RecencyTracker {
    records: HashMap<String, RecencyRecord>,
    clock: u64,
}

impl RecencyTracker {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Creates or refreshes the record for `key` with the current time.
    pub fn touch(&mut self, key: &str) {
        let record = self.stamp();
        match self.records.get_mut(key) {
            Some(existing) => *existing = record,
            None => {
                self.records.insert(key.to_string(), record);
            }
        }
    }

    // == Remove ==
    /// Removes the record for `key`, returning it if one existed.
    pub fn remove(&mut self, key: &str) -> Option<RecencyRecord> {
        self.records.remove(key)
    }

    // == Restore ==
    /// Puts back a record taken by [`RecencyTracker::take_oldest`].
    ///
    /// A record created for `key` in the meantime is newer and wins.
    pub fn restore(&mut self, key: String, record: RecencyRecord) {
        self.records.entry(key).or_insert(record);
    }

    // == Take Oldest ==
    /// Removes and returns up to `n` least recently used records, oldest first.
    pub fn take_oldest(&mut self, n: usize) -> Vec<(String, RecencyRecord)> {
        if n == 0 {
            return Vec::new();
        }
        let victims: Vec<String> = self.ranked().into_iter().take(n).collect();
        victims
            .into_iter()
            .filter_map(|key| self.records.remove_entry(&key))
            .collect()
    }

    // == Ranked ==
    /// All tracked keys, least recently used first.
    pub fn ranked(&self) -> Vec<String> {
        let mut ordered: Vec<(&String, &RecencyRecord)> = self.records.iter().collect();
        ordered.sort_unstable_by_key(|(_, record)| **record);
        ordered.into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Last access of `key`, if tracked.
    #[cfg(test)]
    pub fn last_access(&self, key: &str) -> Option<Instant> {
        self.records.get(key).map(|record| record.last_access)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    fn stamp(&mut self) -> RecencyRecord {
        self.clock += 1;
        RecencyRecord {
            last_access: Instant::now(),
            seq: self.clock,
        }
    }
}
