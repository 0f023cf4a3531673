//! Segment records and the per-pool segment arena.
//!
//! Segments live in a growable arena and are addressed by stable `u32`
//! indices. Chain links, free-space index entries, and allocation handles
//! all refer to segments by index, never by address, so arena growth only
//! appends slots and never invalidates an outstanding reference.
//!
//! Slots retired by coalescing are kept on a free-slot stack and reused by
//! future splits. Every retirement bumps the slot's generation tag, which
//! is how stale allocation handles are detected.

use crate::config::{EXPAND_FACTOR, exceeds_fill_factor};
use crate::error::{PoolError, PoolResult};

/// Stable index of a segment within its pool's arena.
pub(crate) type SegmentId = u32;

/// A contiguous span of a pool's backing buffer.
///
/// Live segments are members of the chain; a slot with `is_live == false`
/// is retired storage awaiting reuse by a future split.
#[derive(Debug)]
pub(crate) struct Segment {
    /// Byte offset within the backing buffer.
    pub offset: usize,
    /// Span length in bytes.
    pub size: usize,
    /// Whether this slot is a member of the chain.
    pub is_live: bool,
    /// Whether the span is handed out to a caller.
    pub is_allocated: bool,
    /// Chain predecessor (lower address).
    pub prev: Option<SegmentId>,
    /// Chain successor (higher address).
    pub next: Option<SegmentId>,
    /// Bumped on retirement and on allocation, invalidating older handles.
    pub generation: u32,
}

/// Growable arena of segment slots with free-slot recycling.
pub(crate) struct SegmentArena {
    slots: Vec<Segment>,
    /// Retired slot indices available for reuse.
    free_slots: Vec<SegmentId>,
    /// Managed capacity; drives fill-factor growth decisions.
    capacity: usize,
    /// Count of live slots.
    live: usize,
}

impl SegmentArena {
    /// Create an arena with the given initial capacity.
    ///
    /// Fails with `OutOfMemory` if the slot storage cannot be obtained.
    pub fn with_capacity(capacity: usize) -> PoolResult<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::OutOfMemory)?;
        Ok(Self {
            slots,
            free_slots: Vec::new(),
            capacity,
            live: 0,
        })
    }

    /// Insert a live segment, reusing a retired slot if one is available.
    ///
    /// Returns the segment's stable id. Chain links start out empty; the
    /// caller wires the segment into the chain afterwards.
    pub fn insert(&mut self, offset: usize, size: usize, is_allocated: bool) -> SegmentId {
        if let Some(id) = self.free_slots.pop() {
            let slot = &mut self.slots[id as usize];
            slot.offset = offset;
            slot.size = size;
            slot.is_live = true;
            slot.is_allocated = is_allocated;
            slot.prev = None;
            slot.next = None;
            self.live += 1;
            return id;
        }

        // Occupancy counts every slot ever handed out, reserved ones
        // included; grow capacity before the push that would cross the
        // fill factor.
        if exceeds_fill_factor(self.slots.len() + 1, self.capacity) {
            let grown = self.capacity * EXPAND_FACTOR;
            self.slots.reserve_exact(grown - self.slots.len());
            self.capacity = grown;
        }

        let id = self.slots.len() as SegmentId;
        self.slots.push(Segment {
            offset,
            size,
            is_live: true,
            is_allocated,
            prev: None,
            next: None,
            generation: 0,
        });
        self.live += 1;
        id
    }

    /// Retire a slot, making it available for reuse.
    ///
    /// The slot's generation is bumped so any outstanding handle to it
    /// stops resolving.
    pub fn retire(&mut self, id: SegmentId) {
        let slot = &mut self.slots[id as usize];
        debug_assert!(slot.is_live, "retiring a slot that is not live");
        slot.is_live = false;
        slot.is_allocated = false;
        slot.prev = None;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(id);
        self.live -= 1;
    }

    /// Get a segment by id.
    #[inline]
    pub fn get(&self, id: SegmentId) -> &Segment {
        &self.slots[id as usize]
    }

    /// Get a segment mutably by id.
    #[inline]
    pub fn get_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.slots[id as usize]
    }

    /// Get a segment by id, or `None` if the index was never issued.
    #[inline]
    pub fn get_checked(&self, id: SegmentId) -> Option<&Segment> {
        self.slots.get(id as usize)
    }

    /// Bump a slot's generation, invalidating handles issued before now.
    pub fn bump_generation(&mut self, id: SegmentId) -> u32 {
        let slot = &mut self.slots[id as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.generation
    }

    /// Wire `new` into the chain immediately after `anchor`.
    pub fn link_after(&mut self, anchor: SegmentId, new: SegmentId) {
        let anchor_next = self.slots[anchor as usize].next;
        {
            let slot = &mut self.slots[new as usize];
            slot.prev = Some(anchor);
            slot.next = anchor_next;
        }
        if let Some(next) = anchor_next {
            self.slots[next as usize].prev = Some(new);
        }
        self.slots[anchor as usize].next = Some(new);
    }

    /// Unwire a segment from the chain, joining its neighbors.
    pub fn unlink(&mut self, id: SegmentId) {
        let (prev, next) = {
            let slot = &self.slots[id as usize];
            (slot.prev, slot.next)
        };
        if let Some(prev) = prev {
            self.slots[prev as usize].next = next;
        }
        if let Some(next) = next {
            self.slots[next as usize].prev = prev;
        }
        let slot = &mut self.slots[id as usize];
        slot.prev = None;
        slot.next = None;
    }

    /// Count of live segments.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Managed capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
