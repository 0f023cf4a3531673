//! Configuration types and tuning constants for the pool engine.

/// Initial registry capacity (pool slots).
pub const POOL_STORE_INIT_CAPACITY: usize = 20;

/// Initial segment arena capacity per pool.
pub const SEGMENT_ARENA_INIT_CAPACITY: usize = 40;

/// Initial free-space index capacity per pool.
pub const GAP_INDEX_INIT_CAPACITY: usize = 40;

/// Occupancy threshold past which a bookkeeping structure grows.
pub const FILL_FACTOR: f64 = 0.75;

/// Capacity multiplier applied when a bookkeeping structure grows.
/// Growth scales capacity only; occupancy is never touched.
pub const EXPAND_FACTOR: usize = 2;

/// Placement strategy used when selecting a gap for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementPolicy {
    /// Select the first sufficient gap in address order.
    FirstFit,
    /// Select the smallest sufficient gap; size ties are broken by the
    /// lowest address.
    BestFit,
}

/// Per-pool bookkeeping configuration.
///
/// The defaults match the engine's standard tuning and are what
/// [`Pool::open`](crate::Pool::open) uses. Custom capacities are mostly
/// useful in tests that want to exercise growth paths early.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Initial segment arena capacity.
    pub segment_capacity: usize,
    /// Initial free-space index capacity.
    pub gap_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            segment_capacity: SEGMENT_ARENA_INIT_CAPACITY,
            gap_capacity: GAP_INDEX_INIT_CAPACITY,
        }
    }
}

/// Whether occupancy `used` out of `capacity` slots exceeds the fill factor
/// and the structure should grow before the next insertion.
#[inline]
pub(crate) fn exceeds_fill_factor(used: usize, capacity: usize) -> bool {
    used as f64 / capacity as f64 > FILL_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.segment_capacity, SEGMENT_ARENA_INIT_CAPACITY);
        assert_eq!(config.gap_capacity, GAP_INDEX_INIT_CAPACITY);
    }

    #[test]
    fn test_fill_factor_threshold() {
        // 30/40 = 0.75 is at the threshold, not past it
        assert!(!exceeds_fill_factor(30, 40));
        assert!(exceeds_fill_factor(31, 40));
        assert!(!exceeds_fill_factor(0, 20));
        assert!(exceeds_fill_factor(20, 20));
    }

    #[test]
    fn test_policy_is_copy_eq() {
        let policy = PlacementPolicy::BestFit;
        let copy = policy;
        assert_eq!(policy, copy);
        assert_ne!(PlacementPolicy::FirstFit, PlacementPolicy::BestFit);
    }
}
