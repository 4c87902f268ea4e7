//! Eviction policies backing the cache tiers.

pub mod lru;

pub use lru::{ConcurrentLruCache, LruCore};
