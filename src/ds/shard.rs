//! Shard selection and capacity splitting for sharded caches.
//!
//! [`ConcurrentLruCache`](crate::policy::lru::ConcurrentLruCache) spreads its
//! entries over several independently locked shards. This module decides which
//! shard owns a key and what share of a global capacity each shard can expect
//! to hold, which sizes its initial allocation.
//!
//! ```text
//!   key ──► ShardSelector { shards: 4, seed } ──► hash(seed, key) % 4
//!
//!   split_capacity(10, 4):
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │
//!   │   3     │   3     │   2     │   2     │   sum == 10
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! Properties:
//! - Deterministic: the same `(key, seed, shards)` always yields the same shard.
//! - The shares always sum to the requested total. They are hints only: the
//!   cache bounds its total occupancy, not each shard.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic shard selector using a seeded hash.
///
/// # Example
///
/// ```
/// use detailcache::ds::ShardSelector;
///
/// let selector = ShardSelector::new(8, 42);
/// let shard = selector.shard_for_key(&1234_u32);
/// assert!(shard < 8);
/// assert_eq!(selector.shard_for_key(&1234_u32), shard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards with the given `seed`.
    ///
    /// The shard count is clamped to at least 1.
    pub fn new(shards: usize, seed: u64) -> Self {
        Self {
            shards: shards.max(1),
            seed,
        }
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps a key to a shard index in `[0, shards)`.
    #[inline]
    pub fn shard_for_key<K: Hash>(&self, key: &K) -> usize {
        if self.shards == 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector with seed 0.
    fn default() -> Self {
        Self::new(1, 0)
    }
}

/// Splits `total` entries into the expected share of each of `shards` shards.
///
/// The first `total % shards` shards receive one extra slot. A shard count
/// of zero is treated as one.
pub fn split_capacity(total: usize, shards: usize) -> Vec<usize> {
    let shards = shards.max(1);
    let base = total / shards;
    let extra = total % shards;
    (0..shards)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}
