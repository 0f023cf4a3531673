//! Packed handle encodings for pools and allocations.
//!
//! Handles pack stable slot indices together with generation tags.
//! Slots are recycled after `close`/`free`, so a bare index would let a
//! stale handle silently reach whatever now occupies the slot. The
//! generation tag is bumped on every recycle; a handle whose generation
//! no longer matches the slot's fails resolution instead.
//!
//! ```text
//! PoolHandle, 64-bit layout:
//! +------------+------------+
//! |   63..32   |   31..0    |
//! | generation | slot index |
//! +------------+------------+
//!
//! AllocHandle, 96-bit layout (within a u128):
//! +----------+------------+---------------+
//! |  95..64  |   63..32   |     31..0     |
//! | pool tag | generation | segment index |
//! +----------+------------+---------------+
//! ```
//!
//! Allocation handles additionally carry the tag of the pool that issued
//! them. Segment indices are per-pool, so two pools can issue handles
//! with identical segment and generation fields; the tag is what lets a
//! pool reject a handle that belongs to another pool.

/// Handle to an open pool in the registry.
///
/// Valid only while the registry holds the pool it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    slot: u32,
    generation: u32,
}

impl PoolHandle {
    /// Create a handle for a registry slot at a given generation.
    #[inline]
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Get the registry slot index.
    #[inline]
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    /// Get the generation tag.
    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into the raw `u64` representation.
    #[inline]
    pub fn as_raw(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.slot as u64)
    }

    /// Unpack from the raw `u64` representation.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self {
            slot: (raw & 0xFFFF_FFFF) as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

/// Handle to a live allocation within a pool.
///
/// Issued by `allocate`, consumed by `free`. Bound to the issuing pool
/// by its tag: presenting the handle to any other pool fails with
/// `InvalidAllocation`. Stale after the allocation is freed, even if the
/// underlying segment slot is later reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocHandle {
    pool: u32,
    segment: u32,
    generation: u32,
}

impl AllocHandle {
    /// Create a handle for an arena segment at a given generation,
    /// issued by the pool carrying `pool` as its tag.
    #[inline]
    pub(crate) fn new(pool: u32, segment: u32, generation: u32) -> Self {
        Self {
            pool,
            segment,
            generation,
        }
    }

    /// Get the issuing pool's tag.
    #[inline]
    pub(crate) fn pool(&self) -> u32 {
        self.pool
    }

    /// Get the arena segment index.
    #[inline]
    pub(crate) fn segment(&self) -> u32 {
        self.segment
    }

    /// Get the generation tag.
    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into the raw `u128` representation.
    #[inline]
    pub fn as_raw(&self) -> u128 {
        ((self.pool as u128) << 64) | ((self.generation as u128) << 32) | (self.segment as u128)
    }

    /// Unpack from the raw `u128` representation.
    #[inline]
    pub fn from_raw(raw: u128) -> Self {
        Self {
            pool: ((raw >> 64) & 0xFFFF_FFFF) as u32,
            segment: (raw & 0xFFFF_FFFF) as u32,
            generation: ((raw >> 32) & 0xFFFF_FFFF) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_handle_roundtrip() {
        let handle = PoolHandle::new(17, 3);
        let decoded = PoolHandle::from_raw(handle.as_raw());
        assert_eq!(decoded, handle);
        assert_eq!(decoded.slot(), 17);
        assert_eq!(decoded.generation(), 3);
    }

    #[test]
    fn test_alloc_handle_roundtrip() {
        let handle = AllocHandle::new(7, 123_456, 789);
        let decoded = AllocHandle::from_raw(handle.as_raw());
        assert_eq!(decoded, handle);
        assert_eq!(decoded.pool(), 7);
        assert_eq!(decoded.segment(), 123_456);
        assert_eq!(decoded.generation(), 789);
    }

    #[test]
    fn test_max_values() {
        let handle = PoolHandle::new(u32::MAX, u32::MAX);
        assert_eq!(handle.as_raw(), u64::MAX);
        let decoded = PoolHandle::from_raw(u64::MAX);
        assert_eq!(decoded.slot(), u32::MAX);
        assert_eq!(decoded.generation(), u32::MAX);

        let handle = AllocHandle::new(u32::MAX, u32::MAX, u32::MAX);
        let decoded = AllocHandle::from_raw(handle.as_raw());
        assert_eq!(decoded, handle);
    }

    #[test]
    fn test_bit_layout() {
        // pool tag at 64-95, generation at 32-63, segment in the low 32
        let raw = AllocHandle::new(0x77, 0xABCD, 0x1234).as_raw();
        assert_eq!(raw >> 64, 0x77);
        assert_eq!((raw >> 32) & 0xFFFF_FFFF, 0x1234);
        assert_eq!(raw & 0xFFFF_FFFF, 0xABCD);
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        let first = AllocHandle::new(0, 5, 0);
        let reused = AllocHandle::new(0, 5, 1);
        assert_ne!(first, reused);
    }

    #[test]
    fn test_pool_tag_distinguishes_handles() {
        // Identical segment and generation, different issuing pools
        let pool_a = AllocHandle::new(0, 0, 1);
        let pool_b = AllocHandle::new(1, 0, 1);
        assert_ne!(pool_a, pool_b);
    }
}
