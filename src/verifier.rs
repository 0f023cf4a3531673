//! Structural invariant checks for pools.
//!
//! `check` walks a pool's segment chain and free-space index and confirms
//! every invariant the engine is supposed to maintain:
//!
//! 1. Live segments tile `[0, total_size)` exactly, in address order.
//! 2. No two chain-adjacent segments are both free.
//! 3. The usage counters match the chain contents.
//! 4. The index holds exactly one entry per live free segment, ordered by
//!    `(size, offset)` ascending.
//!
//! Used by tests after every operation in randomized sequences, and wired
//! into debug assertions on the allocate/free paths.

use std::collections::HashSet;

use crate::pool::Pool;

/// Check a pool against its structural invariants.
///
/// Returns a description of the first violation found.
pub(crate) fn check(pool: &Pool) -> Result<(), String> {
    let arena = pool.arena();

    let head = arena.get(pool.head());
    if head.offset != 0 {
        return Err(format!("chain head at offset {}, expected 0", head.offset));
    }
    if head.prev.is_some() {
        return Err("chain head has a predecessor".into());
    }

    let mut expected_offset = 0;
    let mut chain_len = 0;
    let mut free_segments = HashSet::new();
    let mut allocations = 0;
    let mut allocated_bytes = 0;
    let mut prev_was_free = false;
    let mut prev_id = None;

    let mut cursor = Some(pool.head());
    while let Some(id) = cursor {
        let segment = arena.get(id);
        if !segment.is_live {
            return Err(format!("chain member {id} is not live"));
        }
        if segment.prev != prev_id {
            return Err(format!("segment {id} has inconsistent prev link"));
        }
        if segment.offset != expected_offset {
            return Err(format!(
                "segment {id} at offset {}, expected {expected_offset} (gap or overlap)",
                segment.offset
            ));
        }
        if segment.size == 0 {
            return Err(format!("segment {id} has zero size"));
        }

        if segment.is_allocated {
            allocations += 1;
            allocated_bytes += segment.size;
            prev_was_free = false;
        } else {
            if prev_was_free {
                return Err(format!("segment {id} and its predecessor are both free"));
            }
            free_segments.insert(id);
            prev_was_free = true;
        }

        expected_offset += segment.size;
        chain_len += 1;
        prev_id = Some(id);
        cursor = segment.next;
    }

    if expected_offset != pool.total_size() {
        return Err(format!(
            "chain covers {expected_offset} bytes, pool is {}",
            pool.total_size()
        ));
    }
    if chain_len != arena.live_count() {
        return Err(format!(
            "chain has {chain_len} members, arena has {} live slots",
            arena.live_count()
        ));
    }
    if allocations != pool.num_allocations() {
        return Err(format!(
            "counted {allocations} allocations, pool says {}",
            pool.num_allocations()
        ));
    }
    if allocated_bytes != pool.bytes_allocated() {
        return Err(format!(
            "counted {allocated_bytes} allocated bytes, pool says {}",
            pool.bytes_allocated()
        ));
    }
    if free_segments.len() != pool.num_gaps() {
        return Err(format!(
            "counted {} gaps, pool says {}",
            free_segments.len(),
            pool.num_gaps()
        ));
    }

    let entries = pool.gaps().entries();
    if entries.len() != free_segments.len() {
        return Err(format!(
            "index has {} entries for {} free segments",
            entries.len(),
            free_segments.len()
        ));
    }

    let mut indexed = HashSet::new();
    for window in 0..entries.len() {
        let entry = &entries[window];
        let segment = arena.get(entry.segment);
        if !free_segments.contains(&entry.segment) {
            return Err(format!(
                "index entry for segment {} which is not a live gap",
                entry.segment
            ));
        }
        if entry.size != segment.size || entry.offset != segment.offset {
            return Err(format!(
                "index entry ({}, {}) disagrees with segment {} ({}, {})",
                entry.size, entry.offset, entry.segment, segment.size, segment.offset
            ));
        }
        if !indexed.insert(entry.segment) {
            return Err(format!("segment {} indexed twice", entry.segment));
        }
        if window > 0 {
            let prev = &entries[window - 1];
            if (entry.size, entry.offset) < (prev.size, prev.offset) {
                return Err(format!(
                    "index out of order at position {window}: ({}, {}) after ({}, {})",
                    entry.size, entry.offset, prev.size, prev.offset
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementPolicy;

    #[test]
    fn test_fresh_pool_passes() {
        let pool = Pool::open(4096, PlacementPolicy::FirstFit).unwrap();
        check(&pool).unwrap();
    }

    #[test]
    fn test_fragmented_pool_passes() {
        let mut pool = Pool::open(4096, PlacementPolicy::BestFit).unwrap();
        let allocs: Vec<_> = (0..8).map(|_| pool.allocate(100).unwrap()).collect();
        for alloc in allocs.iter().step_by(2) {
            pool.free(*alloc).unwrap();
        }
        check(&pool).unwrap();
        for alloc in allocs.iter().skip(1).step_by(2) {
            pool.free(*alloc).unwrap();
        }
        check(&pool).unwrap();
    }
}
