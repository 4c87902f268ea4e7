//! detailcache: bounded, thread-safe cache of commit details for a commit log.
//!
//! A [`DetailsCache`](cache::DetailsCache) keeps up to 10,000 fully loaded
//! details per commit index, hands out cheap placeholders for everything else,
//! and empties itself when a [`LowMemoryNotifier`](low_memory::LowMemoryNotifier)
//! signals memory pressure. [`CommitDetailsGetter`](getter::CommitDetailsGetter)
//! fills the cache from per-repository log providers.
//!
//! ```
//! use detailcache::prelude::*;
//!
//! let notifier = LowMemoryNotifier::new();
//! let cache = CommitDetailsCache::for_commit_log(&notifier);
//! assert!(cache.get_cached_data_or_placeholder(CommitIndex::new(1)).is_placeholder());
//! ```

pub mod builder;
pub mod cache;
pub mod details;
pub mod ds;
pub mod error;
pub mod getter;
pub mod low_memory;
pub mod policy;
pub mod storage;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;
