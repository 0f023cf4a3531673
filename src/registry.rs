//! The registry of open pools.
//!
//! Pools are held in a slot array addressed by [`PoolHandle`]. Slots are
//! reused after `close`, with a per-slot generation tag so a stale handle
//! to a closed pool never resolves to whatever pool occupies the slot
//! next. The slot array grows by the standard expansion factor whenever
//! occupancy crosses the fill factor, and never shrinks.

use tracing::debug;

use crate::config::{
    EXPAND_FACTOR, POOL_STORE_INIT_CAPACITY, PlacementPolicy, PoolConfig, exceeds_fill_factor,
};
use crate::error::{PoolError, PoolResult};
use crate::handle::{AllocHandle, PoolHandle};
use crate::pool::{Pool, PoolStats, SegmentInfo};
use crate::storage::BackingStore;

/// Growable collection of open pools, addressable by handle.
pub struct PoolRegistry {
    slots: Vec<Option<Pool>>,
    /// Per-slot generation tags; persist across slot reuse.
    generations: Vec<u32>,
    /// Cleared slot indices available for reuse.
    free_slots: Vec<u32>,
    /// Managed capacity; drives fill-factor growth decisions.
    capacity: usize,
    open_pools: usize,
}

impl PoolRegistry {
    /// Create a registry with the standard initial capacity.
    ///
    /// Fails with `OutOfMemory` if the slot storage cannot be obtained.
    pub fn new() -> PoolResult<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(POOL_STORE_INIT_CAPACITY)
            .map_err(|_| PoolError::OutOfMemory)?;
        let mut generations = Vec::new();
        generations
            .try_reserve_exact(POOL_STORE_INIT_CAPACITY)
            .map_err(|_| PoolError::OutOfMemory)?;
        Ok(Self {
            slots,
            generations,
            free_slots: Vec::new(),
            capacity: POOL_STORE_INIT_CAPACITY,
            open_pools: 0,
        })
    }

    /// Open a pool of `size` bytes and register it.
    pub fn open(&mut self, size: usize, policy: PlacementPolicy) -> PoolResult<PoolHandle> {
        let pool = Pool::open(size, policy)?;
        self.register(pool)
    }

    /// Open a pool drawing backing bytes from an explicit store.
    pub fn open_in(
        &mut self,
        store: Box<dyn BackingStore + Send>,
        size: usize,
        policy: PlacementPolicy,
        config: PoolConfig,
    ) -> PoolResult<PoolHandle> {
        let pool = Pool::open_in(store, size, policy, config)?;
        self.register(pool)
    }

    /// Close a pool, releasing its backing storage.
    ///
    /// Succeeds only when the pool is back to its single-gap,
    /// zero-allocation initial state; otherwise fails with `PoolNotEmpty`
    /// and leaves the pool untouched.
    pub fn close(&mut self, handle: PoolHandle) -> PoolResult<()> {
        if !self.resolve(handle)?.can_close() {
            return Err(PoolError::PoolNotEmpty);
        }
        let pool = self.unregister(handle)?;
        let size = pool.total_size();
        pool.release_storage();
        debug!(size, "pool closed");
        Ok(())
    }

    /// Allocate from a pool.
    pub fn allocate(&mut self, handle: PoolHandle, size: usize) -> PoolResult<AllocHandle> {
        self.resolve_mut(handle)?.allocate(size)
    }

    /// Free an allocation back to its pool.
    pub fn free(&mut self, handle: PoolHandle, alloc: AllocHandle) -> PoolResult<()> {
        self.resolve_mut(handle)?.free(alloc)
    }

    /// Snapshot a pool's live segments in chain order.
    pub fn inspect(&self, handle: PoolHandle) -> PoolResult<Vec<SegmentInfo>> {
        Ok(self.resolve(handle)?.inspect())
    }

    /// Snapshot a pool's usage counters.
    pub fn stats(&self, handle: PoolHandle) -> PoolResult<PoolStats> {
        Ok(self.resolve(handle)?.stats())
    }

    /// Record a pool, returning its handle.
    ///
    /// Fails with `OutOfMemory` if grown slot storage cannot be obtained;
    /// the pool's backing bytes are released before the error is
    /// returned.
    pub fn register(&mut self, pool: Pool) -> PoolResult<PoolHandle> {
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(pool);
                slot
            }
            None => {
                if exceeds_fill_factor(self.slots.len() + 1, self.capacity) {
                    let grown = self.capacity * EXPAND_FACTOR;
                    let reserved = self
                        .slots
                        .try_reserve_exact(grown - self.slots.len())
                        .and_then(|_| {
                            self.generations
                                .try_reserve_exact(grown - self.generations.len())
                        });
                    if reserved.is_err() {
                        pool.release_storage();
                        return Err(PoolError::OutOfMemory);
                    }
                    self.capacity = grown;
                    debug!(capacity = grown, "registry grown");
                }
                let slot = self.slots.len() as u32;
                self.slots.push(Some(pool));
                self.generations.push(0);
                slot
            }
        };
        self.open_pools += 1;
        Ok(PoolHandle::new(slot, self.generations[slot as usize]))
    }

    /// Resolve a handle to its pool.
    pub fn resolve(&self, handle: PoolHandle) -> PoolResult<&Pool> {
        let slot = handle.slot() as usize;
        if slot >= self.slots.len() || self.generations[slot] != handle.generation() {
            return Err(PoolError::InvalidHandle);
        }
        self.slots[slot].as_ref().ok_or(PoolError::InvalidHandle)
    }

    /// Resolve a handle to its pool, mutably.
    pub fn resolve_mut(&mut self, handle: PoolHandle) -> PoolResult<&mut Pool> {
        let slot = handle.slot() as usize;
        if slot >= self.slots.len() || self.generations[slot] != handle.generation() {
            return Err(PoolError::InvalidHandle);
        }
        self.slots[slot].as_mut().ok_or(PoolError::InvalidHandle)
    }

    /// Remove a pool from the registry, invalidating its handle.
    ///
    /// The registry slot is cleared for reuse; the registry itself never
    /// shrinks.
    pub fn unregister(&mut self, handle: PoolHandle) -> PoolResult<Pool> {
        // Validates slot and generation before any mutation
        self.resolve(handle)?;
        let slot = handle.slot() as usize;
        let pool = self.slots[slot].take().ok_or(PoolError::InvalidHandle)?;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_slots.push(handle.slot());
        self.open_pools -= 1;
        Ok(pool)
    }

    /// Count of open pools.
    #[inline]
    pub fn open_count(&self) -> usize {
        self.open_pools
    }

    /// Managed capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drain every pool still open, releasing their storage.
    ///
    /// Used at shutdown; pools left open at that point are a caller
    /// error, surfaced by the caller.
    pub(crate) fn drain(&mut self) {
        for slot in 0..self.slots.len() {
            if let Some(pool) = self.slots[slot].take() {
                self.generations[slot] = self.generations[slot].wrapping_add(1);
                self.free_slots.push(slot as u32);
                self.open_pools -= 1;
                pool.release_storage();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_resolve_unregister() {
        let mut registry = PoolRegistry::new().unwrap();
        let handle = registry.open(1024, PlacementPolicy::FirstFit).unwrap();
        assert_eq!(registry.open_count(), 1);
        assert_eq!(registry.resolve(handle).unwrap().total_size(), 1024);

        let pool = registry.unregister(handle).unwrap();
        assert_eq!(pool.total_size(), 1024);
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.resolve(handle).unwrap_err(), PoolError::InvalidHandle);
    }

    #[test]
    fn test_register_owned_pool() {
        let mut registry = PoolRegistry::new().unwrap();
        let pool = Pool::open(256, PlacementPolicy::FirstFit).unwrap();
        let handle = registry.register(pool).unwrap();
        assert_eq!(registry.open_count(), 1);
        assert_eq!(registry.resolve(handle).unwrap().total_size(), 256);
        registry.close(handle).unwrap();
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut registry = PoolRegistry::new().unwrap();
        let first = registry.open(64, PlacementPolicy::FirstFit).unwrap();
        registry.close(first).unwrap();

        // The new pool reuses the cleared slot at a newer generation
        let second = registry.open(128, PlacementPolicy::FirstFit).unwrap();
        assert_eq!(first.slot(), second.slot());
        assert_ne!(first, second);
        assert_eq!(registry.resolve(first).unwrap_err(), PoolError::InvalidHandle);
        assert_eq!(registry.resolve(second).unwrap().total_size(), 128);
    }

    #[test]
    fn test_growth_preserves_handles() {
        let mut registry = PoolRegistry::new().unwrap();
        let handles: Vec<_> = (1..=50)
            .map(|i| registry.open(i * 16, PlacementPolicy::BestFit).unwrap())
            .collect();
        assert!(registry.capacity() > POOL_STORE_INIT_CAPACITY);
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(registry.resolve(*handle).unwrap().total_size(), (i + 1) * 16);
        }
    }

    #[test]
    fn test_close_guard() {
        let mut registry = PoolRegistry::new().unwrap();
        let handle = registry.open(256, PlacementPolicy::FirstFit).unwrap();
        let alloc = registry.allocate(handle, 32).unwrap();

        assert_eq!(registry.close(handle).unwrap_err(), PoolError::PoolNotEmpty);
        // The pool is still open and untouched
        let stats = registry.stats(handle).unwrap();
        assert_eq!(stats.num_allocations, 1);
        assert_eq!(stats.bytes_allocated, 32);

        registry.free(handle, alloc).unwrap();
        registry.close(handle).unwrap();
    }

    #[test]
    fn test_close_invalid_handle() {
        let mut registry = PoolRegistry::new().unwrap();
        let handle = registry.open(64, PlacementPolicy::FirstFit).unwrap();
        registry.close(handle).unwrap();
        assert_eq!(registry.close(handle).unwrap_err(), PoolError::InvalidHandle);
    }

    #[test]
    fn test_drain_releases_everything() {
        let mut registry = PoolRegistry::new().unwrap();
        let a = registry.open(64, PlacementPolicy::FirstFit).unwrap();
        let _b = registry.open(128, PlacementPolicy::BestFit).unwrap();
        registry.allocate(a, 16).unwrap();

        registry.drain();
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.resolve(a).unwrap_err(), PoolError::InvalidHandle);
    }
}
