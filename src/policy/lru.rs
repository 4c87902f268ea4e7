//! # Least Recently Used (LRU) Cache Implementation
//!
//! Bounded LRU storage used for both tiers of the
//! [`DetailsCache`](crate::cache::DetailsCache): the primary tier of loaded
//! commit details and the placeholder tier.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                     ConcurrentLruCache<K, V>  (Clone)                    │
//!   │                                                                          │
//!   │   ShardSelector ──► Arc<[RwLock<LruCore<K, V>>]>                         │
//!   │   occupancy: AtomicUsize  (slots claimed across all shards)              │
//!   │                       │            │            │                        │
//!   │                       ▼            ▼            ▼                        │
//!   │                   ┌────────┐   ┌────────┐   ┌────────┐                   │
//!   │                   │shard 0 │   │shard 1 │   │shard N │   Σ len <= total  │
//!   │                   └────────┘   └────────┘   └────────┘                   │
//!   └──────────────────────────────────────────────────────────────────────────┘
//!
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                           LruCore<K, V>                                  │
//!   │                                                                          │
//!   │   FxHashMap<K, usize> ──► nodes: Vec<Node<K, V>> (dense, swap_remove)    │
//!   │                                                                          │
//!   │   head ──► [n3] ◄──► [n0] ◄──► [n2] ◄── tail                             │
//!   │   (MRU)                            (LRU)                                 │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes live in a dense vector and link to each other by index. Removing a
//! node moves the last node into the hole (`swap_remove`) and patches its
//! neighbours and map entry, so the vector never holds vacant slots.
//!
//! ## Operations
//!
//! | Operation              | Lock (concurrent) | Recency update |
//! |------------------------|-------------------|----------------|
//! | `insert`               | write             | yes            |
//! | `get` / `get_many`     | write             | yes            |
//! | `get_or_insert_with`   | write             | yes            |
//! | `peek` / `contains`    | read              | no             |
//! | `remove` / `clear`     | write             | -              |
//!
//! Inserting a new key first claims a slot from the shared occupancy counter.
//! Only when every slot is taken does the insert evict, preferring the LRU
//! entry of its own shard. Capacity is therefore never split per shard.
//!
//! `get_or_insert_with` runs the constructor while holding the shard's write
//! lock, so racing callers for the same key always observe one value.
//!
//! ## Example
//!
//! ```
//! use detailcache::policy::lru::ConcurrentLruCache;
//!
//! let cache: ConcurrentLruCache<u32, String> = ConcurrentLruCache::with_shards(100, 4);
//! cache.insert(1, "one".to_string());
//!
//! let (value, created) = cache.get_or_insert_with(2, |k| format!("placeholder {k}"));
//! assert!(created);
//! assert_eq!(*value, "placeholder 2");
//! assert_eq!(cache.len(), 2);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::FxHashMap;

use crate::ds::shard::{ShardSelector, split_capacity};
use crate::error::{ConfigError, InvariantError};

const NIL: usize = usize::MAX;
const SHARD_SEED: u64 = 0x9e37_79b9_7f4a_7c15;
/// Upper bound on slots reserved up front; storage beyond it grows on demand.
const MAX_PREALLOC: usize = 1024;

struct Node<K, V> {
    key: K,
    value: Arc<V>,
    prev: usize,
    next: usize,
}

/// Single-threaded LRU core: hash index plus an index-linked recency list.
///
/// A capacity of 0 creates a cache that accepts no items.
pub struct LruCore<K, V>
where
    K: Copy + Eq + Hash,
{
    map: FxHashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: usize,
    tail: usize,
    capacity: usize,
    evictions: u64,
}

impl<K, V> LruCore<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Creates a new LRU core with the given capacity.
    ///
    /// # Example
    /// ```
    /// use detailcache::policy::lru::LruCore;
    ///
    /// let cache: LruCore<u32, String> = LruCore::new(100);
    /// assert_eq!(cache.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self::with_reserve(capacity, capacity)
    }

    /// Creates a core bounded by `capacity` with room for about `reserve`
    /// entries allocated up front (at most 1024).
    pub fn with_reserve(capacity: usize, reserve: usize) -> Self {
        let reserve = reserve.min(capacity).min(MAX_PREALLOC);
        LruCore {
            map: FxHashMap::with_capacity_and_hasher(reserve, Default::default()),
            nodes: Vec::with_capacity(reserve),
            head: NIL,
            tail: NIL,
            capacity,
            evictions: 0,
        }
    }

    #[inline]
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = &self.nodes[idx];
            (node.prev, node.next)
        };

        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
    }

    #[inline]
    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx];
            node.prev = NIL;
            node.next = old_head;
        }
        match old_head {
            NIL => self.tail = idx,
            h => self.nodes[h].prev = idx,
        }
        self.head = idx;
    }

    #[inline]
    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.detach(idx);
            self.attach_front(idx);
        }
    }

    /// Unlinks and removes the node at `idx`. The caller owns the map entry of
    /// the returned node; the node moved into `idx` gets its entry patched.
    fn take(&mut self, idx: usize) -> Node<K, V> {
        self.detach(idx);
        let node = self.nodes.swap_remove(idx);

        if idx < self.nodes.len() {
            let (prev, next, key) = {
                let moved = &self.nodes[idx];
                (moved.prev, moved.next, moved.key)
            };
            match prev {
                NIL => self.head = idx,
                p => self.nodes[p].next = idx,
            }
            match next {
                NIL => self.tail = idx,
                n => self.nodes[n].prev = idx,
            }
            self.map.insert(key, idx);
        }

        node
    }

    /// Inserts or overwrites `key`, returning the previous value.
    ///
    /// A new key evicts the least recently used entry when the cache is full.
    pub fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        if let Some(&idx) = self.map.get(&key) {
            let previous = std::mem::replace(&mut self.nodes[idx].value, value);
            self.promote(idx);
            return Some(previous);
        }

        if self.capacity == 0 {
            return None;
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            prev: NIL,
            next: NIL,
        });
        self.attach_front(idx);
        self.map.insert(key, idx);
        None
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&Arc<V>> {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        Some(&self.nodes[idx].value)
    }

    /// Looks up `key` without touching recency order.
    pub fn peek(&self, key: &K) -> Option<&Arc<V>> {
        self.map.get(key).map(|&idx| &self.nodes[idx].value)
    }

    /// Returns the value for `key`, building and inserting it when absent.
    ///
    /// The flag is `true` when `make` ran. With capacity 0 the built value is
    /// returned but not retained.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> (Arc<V>, bool)
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.get(&key) {
            return (Arc::clone(value), false);
        }
        let value = Arc::new(make(&key));
        self.insert(key, Arc::clone(&value));
        (value, true)
    }

    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        let idx = self.map.remove(key)?;
        Some(self.take(idx).value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, Arc<V>)> {
        if self.tail == NIL {
            return None;
        }
        let node = self.take(self.tail);
        self.map.remove(&node.key);
        Some((node.key, node.value))
    }

    /// Like [`pop_lru`](Self::pop_lru), but counts the removal as an eviction.
    pub fn evict_lru(&mut self) -> Option<(K, Arc<V>)> {
        let evicted = self.pop_lru();
        if evicted.is_some() {
            self.evictions += 1;
        }
        evicted
    }

    pub fn peek_lru(&self) -> Option<(&K, &Arc<V>)> {
        match self.tail {
            NIL => None,
            t => {
                let node = &self.nodes[t];
                Some((&node.key, &node.value))
            },
        }
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries dropped to make room for new keys.
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Removes every entry and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        removed
    }

    /// Iterates keys from most to least recently used.
    pub fn keys_mru(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let node = &self.nodes[cursor];
            cursor = node.next;
            Some(&node.key)
        })
    }

    /// Verifies map, list and capacity agree. Linear in the number of entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.map.len() != self.nodes.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but {} nodes are allocated",
                self.map.len(),
                self.nodes.len()
            )));
        }
        if self.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "len {} exceeds capacity {}",
                self.len(),
                self.capacity
            )));
        }

        let mut count = 0usize;
        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL {
            if count >= self.nodes.len() {
                return Err(InvariantError::new("cycle detected in recency list"));
            }
            let node = &self.nodes[cursor];
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "node {} has prev {} but was reached from {}",
                    cursor, node.prev, prev
                )));
            }
            if self.map.get(&node.key) != Some(&cursor) {
                return Err(InvariantError::new(format!(
                    "index entry for node {} points elsewhere",
                    cursor
                )));
            }
            count += 1;
            prev = cursor;
            cursor = node.next;
        }

        if prev != self.tail {
            return Err(InvariantError::new("tail does not match last list node"));
        }
        if count != self.nodes.len() {
            return Err(InvariantError::new(format!(
                "recency list links {} of {} nodes",
                count,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for LruCore<K, V>
where
    K: Copy + Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("evictions", &self.evictions)
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for LruCore<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Creates an LRU cache with a default capacity of 16.
    fn default() -> Self {
        Self::new(16)
    }
}

impl<K, V> Extend<(K, Arc<V>)> for LruCore<K, V>
where
    K: Copy + Eq + Hash,
{
    fn extend<T: IntoIterator<Item = (K, Arc<V>)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Thread-safe, sharded LRU cache.
///
/// Cloning yields another handle to the same shards. Occupancy is tracked
/// across all shards, so nothing is evicted until the cache as a whole holds
/// `capacity()` entries. A full cache evicts the least recently used entry of
/// the inserting key's shard, or of another shard when that one is empty.
pub struct ConcurrentLruCache<K, V>
where
    K: Copy + Eq + Hash,
{
    shards: Arc<[RwLock<LruCore<K, V>>]>,
    occupancy: Arc<AtomicUsize>,
    victim_cursor: Arc<AtomicUsize>,
    selector: ShardSelector,
    capacity: usize,
}

impl<K, V> Clone for ConcurrentLruCache<K, V>
where
    K: Copy + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            shards: Arc::clone(&self.shards),
            occupancy: Arc::clone(&self.occupancy),
            victim_cursor: Arc::clone(&self.victim_cursor),
            selector: self.selector.clone(),
            capacity: self.capacity,
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentLruCache<K, V>
where
    K: Copy + Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentLruCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for ConcurrentLruCache<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Creates a single-shard cache with a default capacity of 16.
    fn default() -> Self {
        Self::new(16)
    }
}

impl<K, V> ConcurrentLruCache<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Creates a single-shard cache. Eviction is then strict global LRU.
    ///
    /// # Example
    ///
    /// ```
    /// use detailcache::policy::lru::ConcurrentLruCache;
    ///
    /// let cache: ConcurrentLruCache<u32, String> = ConcurrentLruCache::new(100);
    /// assert_eq!(cache.capacity(), 100);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, 1)
    }

    /// Creates a cache with `shards` independently locked shards.
    ///
    /// # Panics
    ///
    /// Panics if the shard count is invalid; see [`try_with_shards`](Self::try_with_shards).
    pub fn with_shards(capacity: usize, shards: usize) -> Self {
        match Self::try_with_shards(capacity, shards) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a sharded cache, returning an error on invalid parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `shards` is zero or exceeds the capacity.
    pub fn try_with_shards(capacity: usize, shards: usize) -> Result<Self, ConfigError> {
        if shards == 0 {
            return Err(ConfigError::new("shard count must be greater than zero"));
        }
        if shards > capacity.max(1) {
            return Err(ConfigError::new(format!(
                "capacity {} is smaller than shard count {}",
                capacity, shards
            )));
        }
        Ok(Self::build(capacity, shards))
    }

    fn build(capacity: usize, shards: usize) -> Self {
        // Each shard may grow to the full capacity; the expected share only
        // sizes the initial allocation.
        let shards: Vec<_> = split_capacity(capacity, shards)
            .into_iter()
            .map(|share| RwLock::new(LruCore::with_reserve(capacity, share)))
            .collect();
        ConcurrentLruCache {
            selector: ShardSelector::new(shards.len(), SHARD_SEED),
            shards: Arc::from(shards),
            occupancy: Arc::new(AtomicUsize::new(0)),
            victim_cursor: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    #[inline]
    fn shard(&self, key: &K) -> &RwLock<LruCore<K, V>> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    /// Claims one unit of global occupancy if the cache is not full.
    fn reserve_slot(&self) -> bool {
        self.occupancy
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (held < self.capacity).then_some(held + 1)
            })
            .is_ok()
    }

    /// Evicts the LRU entry of the first non-empty shard other than `skip`.
    fn evict_elsewhere(&self, skip: usize) -> bool {
        let count = self.shards.len();
        let start = self.victim_cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..count {
            let idx = (start + offset) % count;
            if idx == skip {
                continue;
            }
            let mut core = self.shards[idx].write();
            if core.evict_lru().is_some() {
                self.occupancy.fetch_sub(1, Ordering::AcqRel);
                return true;
            }
        }
        false
    }

    /// Write-locks the shard of `key` such that inserting `key` keeps the
    /// cache within capacity: either `key` is present, a slot was reserved,
    /// or the shard gave up its LRU entry. Requires a non-zero capacity.
    fn lock_for_insert(&self, key: &K) -> RwLockWriteGuard<'_, LruCore<K, V>> {
        let idx = self.selector.shard_for_key(key);
        loop {
            let mut core = self.shards[idx].write();
            if core.contains(key) || self.reserve_slot() || core.evict_lru().is_some() {
                return core;
            }
            drop(core);
            if !self.evict_elsewhere(idx) {
                // Another thread holds a reservation it has not filled yet.
                std::thread::yield_now();
            }
        }
    }

    /// Inserts a value, wrapping it in `Arc<V>`. Returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        self.insert_arc(key, Arc::new(value))
    }

    /// Inserts an already shared value.
    ///
    /// ```
    /// use detailcache::policy::lru::ConcurrentLruCache;
    /// use std::sync::Arc;
    ///
    /// let cache: ConcurrentLruCache<u32, String> = ConcurrentLruCache::new(10);
    /// let shared = Arc::new("shared".to_string());
    /// cache.insert_arc(1, Arc::clone(&shared));
    /// assert!(Arc::ptr_eq(&shared, &cache.get(&1).unwrap()));
    /// ```
    pub fn insert_arc(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        if self.capacity == 0 {
            return None;
        }
        self.lock_for_insert(&key).insert(key, value)
    }

    /// Gets a value and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).write().get(key).map(Arc::clone)
    }

    /// Gets a value under a read lock without touching recency order.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).read().peek(key).map(Arc::clone)
    }

    /// Looks up many keys, locking each shard at most once.
    ///
    /// Only present keys appear in the result; order follows shard grouping.
    pub fn get_many<I>(&self, keys: I) -> Vec<(K, Arc<V>)>
    where
        I: IntoIterator<Item = K>,
    {
        let mut buckets: Vec<Vec<K>> = vec![Vec::new(); self.shards.len()];
        for key in keys {
            buckets[self.selector.shard_for_key(&key)].push(key);
        }

        let mut found = Vec::new();
        for (shard, bucket) in self.shards.iter().zip(buckets) {
            if bucket.is_empty() {
                continue;
            }
            let mut core = shard.write();
            for key in bucket {
                if let Some(value) = core.get(&key) {
                    found.push((key, Arc::clone(value)));
                }
            }
        }
        found
    }

    /// Returns the cached value or atomically builds and caches one.
    ///
    /// `make` runs under the shard's write lock, so concurrent callers for the
    /// same key receive the same `Arc`. The flag reports whether `make` ran.
    /// With capacity 0 the built value is returned but not retained.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> (Arc<V>, bool)
    where
        F: FnOnce(&K) -> V,
    {
        if self.capacity == 0 {
            return (Arc::new(make(&key)), true);
        }
        self.lock_for_insert(&key).get_or_insert_with(key, make)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let mut core = self.shard(key).write();
        let removed = core.remove(key);
        if removed.is_some() {
            self.occupancy.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Entries dropped by capacity pressure across all shards.
    pub fn evictions(&self) -> u64 {
        self.shards.iter().map(|s| s.read().evictions()).sum()
    }

    /// Clears every shard and returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                let mut core = s.write();
                let removed = core.clear();
                self.occupancy.fetch_sub(removed, Ordering::AcqRel);
                removed
            })
            .sum()
    }

    /// Runs [`LruCore::check_invariants`] on every shard and checks the
    /// global bound. Only meaningful while no other thread is writing.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.shards
            .iter()
            .try_for_each(|s| s.read().check_invariants())?;

        let len = self.len();
        let occupancy = self.occupancy.load(Ordering::Acquire);
        if len > self.capacity {
            return Err(InvariantError::new(format!(
                "len {} exceeds capacity {}",
                len, self.capacity
            )));
        }
        if len != occupancy {
            return Err(InvariantError::new(format!(
                "occupancy counter {} disagrees with len {}",
                occupancy, len
            )));
        }
        Ok(())
    }
}
