//! Sorted set of retained segment ids
//!
//! Guarded by its own lock, separate from the writer lock, so that cursors
//! can locate segments without contending with appends.

use std::collections::BTreeSet;

use parking_lot::{Mutex, MutexGuard};

/// Totally ordered set of segment start LSNs known to exist on disk.
#[derive(Debug, Default)]
pub struct SegmentIndex {
    ids: Mutex<BTreeSet<u64>>,
}

impl SegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly created (or recovered) segment id.
    pub fn add(&self, id: u64) {
        self.ids.lock().insert(id);
    }

    /// Largest known id
    pub fn max(&self) -> Option<u64> {
        self.ids.lock().last().copied()
    }

    /// Number of retained segments and the smallest retained id.
    pub fn stats(&self) -> (usize, Option<u64>) {
        let ids = self.ids.lock();
        (ids.len(), ids.first().copied())
    }

    /// Greatest id `<= lsn`: the segment that would hold `lsn`.
    pub fn floor(&self, lsn: u64) -> Option<u64> {
        self.ids.lock().range(..=lsn).next_back().copied()
    }

    /// Smallest id strictly greater than `id`.
    pub fn next_after(&self, id: u64) -> Option<u64> {
        self.ids
            .lock()
            .range((std::ops::Bound::Excluded(id), std::ops::Bound::Unbounded))
            .next()
            .copied()
    }

    /// Removes and returns every id below `floor`, except the greatest
    /// id `<= floor`, which may still hold records at or above it.
    pub fn gc_between(&self, floor: u64) -> Vec<u64> {
        let mut ids = self.ids.lock();
        let keep = match ids.range(..=floor).next_back() {
            Some(&id) => id,
            None => return Vec::new(),
        };
        let removed: Vec<u64> = ids.range(..keep).copied().collect();
        for id in &removed {
            ids.remove(id);
        }
        removed
    }

    /// Holds the index lock, for callers that must enumerate segments
    /// atomically with respect to GC.
    pub fn lock(&self) -> MutexGuard<'_, BTreeSet<u64>> {
        self.ids.lock()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.ids.lock().iter().copied().collect()
    }
}
