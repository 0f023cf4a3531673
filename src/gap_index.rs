//! Free-space index: the sorted view over a pool's gaps.
//!
//! Entries mirror the free subset of the segment chain, ordered by
//! `(size ascending, offset ascending)`. The offset tie-break makes
//! best-fit placement deterministic when several gaps share a size.
//!
//! Insertion appends and bubbles the one out-of-order entry into place;
//! removal compacts the remaining entries. Both are O(n) on the gap count,
//! which stays small in practice because gaps are maximally merged.

use crate::config::{EXPAND_FACTOR, exceeds_fill_factor};
use crate::error::{PoolError, PoolResult};
use crate::segment::SegmentId;

/// One free segment, as seen by the index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GapEntry {
    /// Gap size in bytes.
    pub size: usize,
    /// Gap offset within the backing buffer; the ordering tie-break.
    pub offset: usize,
    /// The free segment this entry mirrors.
    pub segment: SegmentId,
}

/// Sorted index over a pool's free segments.
pub(crate) struct GapIndex {
    entries: Vec<GapEntry>,
    /// Managed capacity; drives fill-factor growth decisions.
    capacity: usize,
}

impl GapIndex {
    /// Create an index with the given initial capacity.
    ///
    /// Fails with `OutOfMemory` if the entry storage cannot be obtained.
    pub fn with_capacity(capacity: usize) -> PoolResult<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::OutOfMemory)?;
        Ok(Self { entries, capacity })
    }

    /// Register a free segment.
    ///
    /// Grows the index first if the fill factor would be exceeded, appends
    /// the entry, then moves it left until `(size, offset)` order is
    /// restored. Only the appended entry can be out of order, so the
    /// single pass suffices.
    pub fn insert(&mut self, size: usize, offset: usize, segment: SegmentId) {
        if exceeds_fill_factor(self.entries.len() + 1, self.capacity) {
            let grown = self.capacity * EXPAND_FACTOR;
            self.entries.reserve_exact(grown - self.entries.len());
            self.capacity = grown;
        }

        self.entries.push(GapEntry {
            size,
            offset,
            segment,
        });

        let mut i = self.entries.len() - 1;
        while i > 0 {
            let prev = &self.entries[i - 1];
            if (size, offset) < (prev.size, prev.offset) {
                self.entries.swap(i, i - 1);
                i -= 1;
            } else {
                break;
            }
        }
    }

    /// Remove the entry for a free segment, compacting the remainder.
    ///
    /// # Panics
    ///
    /// Panics if the segment has no entry. Every live free segment has
    /// exactly one; a missing entry means the caller broke that contract.
    pub fn remove(&mut self, segment: SegmentId) -> GapEntry {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.segment == segment);
        match position {
            Some(i) => self.entries.remove(i),
            None => panic!("segment {segment} has no free-space index entry"),
        }
    }

    /// Smallest sufficient gap for a request, ties broken by lowest offset.
    ///
    /// Entries are sorted ascending, so the first sufficient entry is the
    /// best fit.
    pub fn best_fit(&self, size: usize) -> Option<SegmentId> {
        self.entries
            .iter()
            .find(|entry| entry.size >= size)
            .map(|entry| entry.segment)
    }

    /// All entries, in index order.
    #[inline]
    pub fn entries(&self) -> &[GapEntry] {
        &self.entries
    }

    /// Count of indexed gaps.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Managed capacity in entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(index: &GapIndex) -> Vec<usize> {
        index.entries().iter().map(|e| e.size).collect()
    }

    #[test]
    fn test_insert_keeps_size_order() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(30, 100, 1);
        index.insert(10, 0, 0);
        index.insert(20, 200, 2);
        assert_eq!(sizes(&index), vec![10, 20, 30]);
    }

    #[test]
    fn test_size_ties_break_by_offset() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(16, 300, 3);
        index.insert(16, 100, 1);
        index.insert(16, 200, 2);
        let offsets: Vec<usize> = index.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![100, 200, 300]);
    }

    #[test]
    fn test_remove_compacts() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(10, 0, 0);
        index.insert(20, 10, 1);
        index.insert(30, 30, 2);
        let removed = index.remove(1);
        assert_eq!(removed.size, 20);
        assert_eq!(sizes(&index), vec![10, 30]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    #[should_panic(expected = "no free-space index entry")]
    fn test_remove_missing_panics() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(10, 0, 0);
        index.remove(42);
    }

    #[test]
    fn test_best_fit_smallest_sufficient() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(10, 0, 0);
        index.insert(30, 10, 1);
        index.insert(20, 40, 2);
        // 15 fits in 20 and 30; the 20-gap is the best fit
        assert_eq!(index.best_fit(15), Some(2));
        assert_eq!(index.best_fit(25), Some(1));
        assert_eq!(index.best_fit(5), Some(0));
        assert_eq!(index.best_fit(31), None);
    }

    #[test]
    fn test_best_fit_tie_prefers_lowest_offset() {
        let mut index = GapIndex::with_capacity(8).unwrap();
        index.insert(16, 500, 5);
        index.insert(16, 100, 1);
        assert_eq!(index.best_fit(16), Some(1));
    }

    #[test]
    fn test_growth_preserves_order() {
        let mut index = GapIndex::with_capacity(4).unwrap();
        for i in 0..32usize {
            // Descending sizes stress the bubble pass
            index.insert(64 - i, i * 100, i as SegmentId);
        }
        assert!(index.capacity() >= 32);
        let observed = sizes(&index);
        let mut expected = observed.clone();
        expected.sort_unstable();
        assert_eq!(observed, expected);
    }
}
