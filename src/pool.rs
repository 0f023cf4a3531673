//! A single memory pool and its allocation engine.
//!
//! A [`Pool`] owns one backing buffer plus the bookkeeping that carves it
//! into segments: the address-ordered segment chain and the size-ordered
//! free-space index. `allocate` picks a gap under the pool's placement
//! policy and splits it when oversized; `free` returns a segment to the
//! gap population and merges it with free chain neighbors so that no two
//! adjacent segments are ever both free.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::config::{PlacementPolicy, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::gap_index::GapIndex;
use crate::handle::AllocHandle;
use crate::segment::{SegmentArena, SegmentId};
use crate::storage::{BackingBuffer, BackingStore, SystemStore};
use crate::verifier;

/// One live segment, as reported by [`Pool::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment size in bytes.
    pub size: usize,
    /// Whether the segment is handed out to a caller.
    pub is_allocated: bool,
}

/// Snapshot of a pool's usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Backing buffer size in bytes.
    pub total_size: usize,
    /// Sum of live allocated segment sizes.
    pub bytes_allocated: usize,
    /// Count of live allocated segments.
    pub num_allocations: usize,
    /// Count of live free segments.
    pub num_gaps: usize,
}

/// Source of process-wide pool tags.
///
/// Segment ids and generations are per-pool, so allocation handles carry
/// this tag to identify their issuing pool; without it, two pools could
/// issue indistinguishable handles.
static NEXT_POOL_TAG: AtomicU32 = AtomicU32::new(0);

/// A backing buffer plus its placement policy and segment bookkeeping.
pub struct Pool {
    buffer: BackingBuffer,
    store: Box<dyn BackingStore + Send>,
    /// Stamped into every handle this pool issues.
    tag: u32,
    total_size: usize,
    policy: PlacementPolicy,
    arena: SegmentArena,
    gaps: GapIndex,
    /// Chain head: the segment at offset zero.
    head: SegmentId,
    num_allocations: usize,
    bytes_allocated: usize,
    num_gaps: usize,
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("tag", &self.tag)
            .field("total_size", &self.total_size)
            .field("policy", &self.policy)
            .field("num_allocations", &self.num_allocations)
            .field("bytes_allocated", &self.bytes_allocated)
            .field("num_gaps", &self.num_gaps)
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Open a pool of `size` bytes drawn from the system heap.
    pub fn open(size: usize, policy: PlacementPolicy) -> PoolResult<Self> {
        Self::open_in(Box::new(SystemStore), size, policy, PoolConfig::default())
    }

    /// Open a pool drawing backing bytes from an explicit store.
    ///
    /// Any acquisition failure releases whatever was already acquired
    /// before the error is returned.
    pub fn open_in(
        store: Box<dyn BackingStore + Send>,
        size: usize,
        policy: PlacementPolicy,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        if size == 0 {
            return Err(PoolError::InvalidRequest);
        }

        let buffer = store.acquire(size)?;

        let mut arena = match SegmentArena::with_capacity(config.segment_capacity) {
            Ok(arena) => arena,
            Err(err) => {
                store.release(buffer);
                return Err(err);
            }
        };

        let mut gaps = match GapIndex::with_capacity(config.gap_capacity) {
            Ok(gaps) => gaps,
            Err(err) => {
                store.release(buffer);
                return Err(err);
            }
        };

        // The whole buffer starts as a single gap.
        let head = arena.insert(0, size, false);
        gaps.insert(size, 0, head);

        debug!(size, policy = ?policy, "pool opened");

        Ok(Self {
            buffer,
            store,
            tag: NEXT_POOL_TAG.fetch_add(1, Ordering::Relaxed),
            total_size: size,
            policy,
            arena,
            gaps,
            head,
            num_allocations: 0,
            bytes_allocated: 0,
            num_gaps: 1,
        })
    }

    /// Allocate `size` bytes from the pool.
    ///
    /// Placement follows the pool's policy; an oversized winner is split,
    /// with the remainder staying behind as a new gap immediately after
    /// the allocation in the chain. Fails with `NoFit` without mutating
    /// the pool when no sufficient gap exists.
    pub fn allocate(&mut self, size: usize) -> PoolResult<AllocHandle> {
        if size == 0 {
            return Err(PoolError::InvalidRequest);
        }
        if self.num_gaps == 0 {
            return Err(PoolError::NoFit);
        }

        let winner = match self.policy {
            PlacementPolicy::FirstFit => self.first_fit(size),
            PlacementPolicy::BestFit => self.gaps.best_fit(size),
        }
        .ok_or(PoolError::NoFit)?;

        let (winner_offset, winner_size) = {
            let segment = self.arena.get(winner);
            (segment.offset, segment.size)
        };

        self.gaps.remove(winner);

        let remainder = winner_size - size;
        if remainder > 0 {
            let rest_offset = winner_offset + size;
            let rest = self.arena.insert(rest_offset, remainder, false);
            self.arena.link_after(winner, rest);
            self.gaps.insert(remainder, rest_offset, rest);
        }

        // New generation per allocation, so a handle freed and reissued
        // from the same slot cannot be confused with this one.
        let generation = self.arena.bump_generation(winner);
        let segment = self.arena.get_mut(winner);
        segment.size = size;
        segment.is_allocated = true;

        self.num_allocations += 1;
        self.bytes_allocated += size;
        if remainder == 0 {
            self.num_gaps -= 1;
        }

        debug_assert!(verifier::check(self).is_ok());

        Ok(AllocHandle::new(self.tag, winner, generation))
    }

    /// Free an allocation, merging with free chain neighbors.
    ///
    /// The handle must have been issued by this pool; handles from any
    /// other pool fail with `InvalidAllocation` even when their segment
    /// and generation fields happen to match a live allocation here.
    ///
    /// The successor is absorbed into the freed segment first, then the
    /// (possibly enlarged) freed segment is absorbed into a free
    /// predecessor. The single surviving gap is indexed exactly once.
    pub fn free(&mut self, handle: AllocHandle) -> PoolResult<()> {
        if handle.pool() != self.tag {
            return Err(PoolError::InvalidAllocation);
        }
        let id = handle.segment();
        let segment = self
            .arena
            .get_checked(id)
            .ok_or(PoolError::InvalidAllocation)?;
        if !segment.is_live
            || !segment.is_allocated
            || segment.generation != handle.generation()
        {
            return Err(PoolError::InvalidAllocation);
        }
        let freed_size = segment.size;

        self.arena.get_mut(id).is_allocated = false;
        self.num_allocations -= 1;
        self.bytes_allocated -= freed_size;

        let mut survivor = id;
        let mut merged = 0;

        // Absorb a free successor.
        if let Some(next) = self.arena.get(id).next {
            if !self.arena.get(next).is_allocated {
                self.gaps.remove(next);
                let next_size = self.arena.get(next).size;
                self.arena.get_mut(id).size += next_size;
                self.arena.unlink(next);
                self.arena.retire(next);
                merged += 1;
            }
        }

        // Let a free predecessor absorb the freed segment.
        if let Some(prev) = self.arena.get(id).prev {
            if !self.arena.get(prev).is_allocated {
                self.gaps.remove(prev);
                let absorbed = self.arena.get(id).size;
                self.arena.get_mut(prev).size += absorbed;
                self.arena.unlink(id);
                self.arena.retire(id);
                survivor = prev;
                merged += 1;
            }
        }

        let (size, offset) = {
            let segment = self.arena.get(survivor);
            (segment.size, segment.offset)
        };
        self.gaps.insert(size, offset, survivor);
        self.num_gaps = self.num_gaps + 1 - merged;

        debug_assert!(verifier::check(self).is_ok());

        Ok(())
    }

    /// First live free segment of sufficient size, in address order.
    fn first_fit(&self, size: usize) -> Option<SegmentId> {
        let mut cursor = Some(self.head);
        while let Some(id) = cursor {
            let segment = self.arena.get(id);
            if !segment.is_allocated && segment.size >= size {
                return Some(id);
            }
            cursor = segment.next;
        }
        None
    }

    /// Snapshot the live segments in chain (address) order.
    pub fn inspect(&self) -> Vec<SegmentInfo> {
        let mut segments = Vec::with_capacity(self.arena.live_count());
        let mut cursor = Some(self.head);
        while let Some(id) = cursor {
            let segment = self.arena.get(id);
            segments.push(SegmentInfo {
                size: segment.size,
                is_allocated: segment.is_allocated,
            });
            cursor = segment.next;
        }
        segments
    }

    /// Snapshot the usage counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_size: self.total_size,
            bytes_allocated: self.bytes_allocated,
            num_allocations: self.num_allocations,
            num_gaps: self.num_gaps,
        }
    }

    /// Whether the pool is back to its initial single-gap state and may
    /// be closed.
    #[inline]
    pub fn can_close(&self) -> bool {
        self.num_gaps == 1 && self.num_allocations == 0
    }

    /// Backing buffer size in bytes.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// The pool's placement policy.
    #[inline]
    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Check the pool's structural invariants.
    ///
    /// Returns a description of the first violation found, if any. Meant
    /// for tests and diagnostics; every public operation maintains these
    /// invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        verifier::check(self)
    }

    /// Hand the backing buffer back to its store, consuming the pool.
    pub(crate) fn release_storage(self) {
        let Pool { buffer, store, .. } = self;
        store.release(buffer);
    }

    pub(crate) fn arena(&self) -> &SegmentArena {
        &self.arena
    }

    pub(crate) fn gaps(&self) -> &GapIndex {
        &self.gaps
    }

    pub(crate) fn head(&self) -> SegmentId {
        self.head
    }

    pub(crate) fn num_gaps(&self) -> usize {
        self.num_gaps
    }

    pub(crate) fn num_allocations(&self) -> usize {
        self.num_allocations
    }

    pub(crate) fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self) -> &BackingBuffer {
        &self.buffer
    }
}
