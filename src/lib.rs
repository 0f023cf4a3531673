//! User-space memory-pool allocator with selectable placement.
//!
//! This crate carves fixed-size backing buffers into variable-size
//! regions and hands out / reclaims sub-allocations without returning to
//! the system allocator for every request. Placement is first-fit or
//! best-fit per pool, and adjacent free space is coalesced eagerly.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------+
//! |                PoolRegistry                 |
//! |  handle -> Pool (slot array, generations)   |
//! |                                             |
//! |  +---------------------------------------+  |
//! |  | Pool                                  |  |
//! |  | +----------------+ +----------------+ |  |
//! |  | | SegmentArena   | | GapIndex       | |  |
//! |  | | chain of       | | free segments  | |  |
//! |  | | alloc/free     | | sorted by      | |  |
//! |  | | segments by id | | (size, offset) | |  |
//! |  | +----------------+ +----------------+ |  |
//! |  |        backing buffer (opaque)        |  |
//! |  +---------------------------------------+  |
//! +---------------------------------------------+
//! ```
//!
//! Segments live in a per-pool arena addressed by stable `u32` ids; chain
//! links, index entries, and allocation handles all refer to segments by
//! id, so arena growth never invalidates an outstanding reference.
//!
//! # Invariants
//!
//! After every public operation:
//!
//! - live segments tile `[0, total_size)` exactly, in address order
//! - no two chain-adjacent segments are both free
//! - the free-space index holds one entry per gap, `(size, offset)` sorted
//! - usage counters match the chain contents
//!
//! # Example
//!
//! ```
//! use segpool::{PlacementPolicy, PoolRegistry};
//!
//! let mut registry = PoolRegistry::new()?;
//! let pool = registry.open(4096, PlacementPolicy::BestFit)?;
//!
//! let alloc = registry.allocate(pool, 512)?;
//! assert_eq!(registry.stats(pool)?.bytes_allocated, 512);
//!
//! registry.free(pool, alloc)?;
//! registry.close(pool)?;
//! # Ok::<(), segpool::PoolError>(())
//! ```
//!
//! # Process-wide lifecycle
//!
//! Callers that want a process-scoped registry instead of an owned one
//! use [`init`] / [`shutdown`] and the free-function forms of the same
//! operations. Every operation is synchronous and runs to completion;
//! concurrent callers of the process-wide API are serialized on one lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod gap_index;
mod handle;
mod pool;
mod registry;
mod segment;
mod storage;
mod verifier;

pub use config::{
    EXPAND_FACTOR, FILL_FACTOR, GAP_INDEX_INIT_CAPACITY, POOL_STORE_INIT_CAPACITY,
    PlacementPolicy, PoolConfig, SEGMENT_ARENA_INIT_CAPACITY,
};
pub use error::{PoolError, PoolResult};
pub use handle::{AllocHandle, PoolHandle};
pub use pool::{Pool, PoolStats, SegmentInfo};
pub use registry::PoolRegistry;
pub use storage::{BackingBuffer, BackingStore, SystemStore};

use parking_lot::Mutex;
use tracing::warn;

/// Process-wide registry, explicit state behind the `init`/`shutdown`
/// lifecycle. `None` while uninitialized.
static REGISTRY: Mutex<Option<PoolRegistry>> = Mutex::new(None);

/// Initialize the process-wide registry.
///
/// Must be called exactly once before any other process-wide operation;
/// calling again before [`shutdown`] fails with `AlreadyInitialized`.
pub fn init() -> PoolResult<()> {
    let mut guard = REGISTRY.lock();
    if guard.is_some() {
        return Err(PoolError::AlreadyInitialized);
    }
    *guard = Some(PoolRegistry::new()?);
    Ok(())
}

/// Tear down the process-wide registry.
///
/// Pools still open at shutdown are a caller error; they are drained and
/// released, with a warning naming how many were left behind. Fails with
/// `NotInitialized` when no registry is up.
pub fn shutdown() -> PoolResult<()> {
    let mut guard = REGISTRY.lock();
    let mut registry = guard.take().ok_or(PoolError::NotInitialized)?;
    if registry.open_count() > 0 {
        warn!(
            open_pools = registry.open_count(),
            "shutdown with pools still open"
        );
        registry.drain();
    }
    Ok(())
}

/// Run an operation against the process-wide registry.
fn with_registry<T>(op: impl FnOnce(&mut PoolRegistry) -> PoolResult<T>) -> PoolResult<T> {
    let mut guard = REGISTRY.lock();
    let registry = guard.as_mut().ok_or(PoolError::NotInitialized)?;
    op(registry)
}

/// Open a pool of `size` bytes in the process-wide registry.
pub fn open(size: usize, policy: PlacementPolicy) -> PoolResult<PoolHandle> {
    with_registry(|registry| registry.open(size, policy))
}

/// Close a pool in the process-wide registry.
pub fn close(handle: PoolHandle) -> PoolResult<()> {
    with_registry(|registry| registry.close(handle))
}

/// Allocate `size` bytes from a pool in the process-wide registry.
pub fn allocate(handle: PoolHandle, size: usize) -> PoolResult<AllocHandle> {
    with_registry(|registry| registry.allocate(handle, size))
}

/// Free an allocation in the process-wide registry.
pub fn free(handle: PoolHandle, alloc: AllocHandle) -> PoolResult<()> {
    with_registry(|registry| registry.free(handle, alloc))
}

/// Snapshot a pool's live segments in chain order.
pub fn inspect(handle: PoolHandle) -> PoolResult<Vec<SegmentInfo>> {
    with_registry(|registry| registry.inspect(handle))
}

/// Snapshot a pool's usage counters.
pub fn stats(handle: PoolHandle) -> PoolResult<PoolStats> {
    with_registry(|registry| registry.stats(handle))
}
