//! Two-tier cache of commit details with placeholder fallback.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                           DetailsCache<D, P>                             │
//!   │                                                                          │
//!   │   details:      ConcurrentLruCache<CommitIndex, D>   (10,000 by default) │
//!   │                    ▲  authoritative; cleared on low memory               │
//!   │                    │                                                     │
//!   │   placeholders: ConcurrentLruCache<CommitIndex, P>   (1,000 by default)  │
//!   │                    ▲  consulted only when `details` misses               │
//!   │                    │  built by PlaceholderFactory under the shard lock   │
//!   │                                                                          │
//!   │   subscription: LowMemorySubscription  ── dropped on dispose / Drop      │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lookup flow
//!
//! ```text
//!   get_cached_data_or_placeholder(id)
//!     ├─ details hit ─────────────────────────► Cached(Arc<D>)
//!     └─ details miss
//!          ├─ placeholder hit ────────────────► Placeholder(Arc<P>) (same Arc as before)
//!          └─ placeholder miss: factory(id) ──► Placeholder(Arc<P>) (cached)
//! ```
//!
//! The cache never loads anything itself. A loader (see
//! [`CommitDetailsGetter`](crate::getter::CommitDetailsGetter)) calls
//! [`save_in_cache`](DetailsCache::save_in_cache) once a record is fully read.
//! Any entry can disappear at any time (capacity or low-memory eviction), so
//! callers must treat a miss as normal.
//!
//! ## Example
//!
//! ```
//! use detailcache::cache::{CommitDetailsCache, DetailsLookup};
//! use detailcache::details::CommitIndex;
//! use detailcache::low_memory::LowMemoryNotifier;
//!
//! let notifier = LowMemoryNotifier::new();
//! let cache = CommitDetailsCache::for_commit_log(&notifier);
//!
//! let commit = CommitIndex::new(7);
//! assert!(cache.get_cached_data(commit).is_none());
//! match cache.get_cached_data_or_placeholder(commit) {
//!     DetailsLookup::Placeholder(p) => assert_eq!(p.commit(), commit),
//!     DetailsLookup::Cached(_) => unreachable!(),
//! }
//!
//! notifier.notify_low_memory();
//! cache.dispose();
//! assert_eq!(notifier.listener_count(), 0);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::builder::{DetailsCacheBuilder, DetailsCacheConfig};
use crate::details::{CommitIndex, FullCommitDetails, LoadingDetails};
use crate::error::ConfigError;
use crate::low_memory::{LowMemoryNotifier, LowMemorySubscription};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::DetailsCacheMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::DetailsCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{DetailsMetricsRecorder, MetricsSnapshotProvider};
use crate::policy::lru::ConcurrentLruCache;
use crate::traits::PlaceholderFactory;

/// Result of [`DetailsCache::get_cached_data_or_placeholder`].
#[derive(Debug)]
pub enum DetailsLookup<D, P> {
    /// Fully loaded details from the primary tier.
    Cached(Arc<D>),
    /// Stand-in for details that are not cached.
    Placeholder(Arc<P>),
}

impl<D, P> DetailsLookup<D, P> {
    pub fn is_cached(&self) -> bool {
        matches!(self, DetailsLookup::Cached(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DetailsLookup::Placeholder(_))
    }

    pub fn cached(&self) -> Option<&Arc<D>> {
        match self {
            DetailsLookup::Cached(details) => Some(details),
            DetailsLookup::Placeholder(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<&Arc<P>> {
        match self {
            DetailsLookup::Cached(_) => None,
            DetailsLookup::Placeholder(placeholder) => Some(placeholder),
        }
    }
}

impl<D, P> Clone for DetailsLookup<D, P> {
    fn clone(&self) -> Self {
        match self {
            DetailsLookup::Cached(details) => DetailsLookup::Cached(Arc::clone(details)),
            DetailsLookup::Placeholder(p) => DetailsLookup::Placeholder(Arc::clone(p)),
        }
    }
}

/// Bounded, thread-safe cache of loaded details keyed by commit index, with
/// a bounded placeholder tier and low-memory eviction.
///
/// Every method takes `&self`; share the cache with `Arc`.
pub struct DetailsCache<D, P> {
    details: ConcurrentLruCache<CommitIndex, D>,
    placeholders: ConcurrentLruCache<CommitIndex, P>,
    factory: Box<dyn PlaceholderFactory<P>>,
    subscription: Mutex<Option<LowMemorySubscription>>,
    disposed: AtomicBool,
    #[cfg(feature = "metrics")]
    metrics: Arc<DetailsCacheMetrics>,
}

impl<D, P> DetailsCache<D, P>
where
    D: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Creates a cache with [`DetailsCacheConfig::default`] sizing and
    /// registers it with `notifier`.
    pub fn new<F>(notifier: &LowMemoryNotifier, factory: F) -> Self
    where
        F: PlaceholderFactory<P> + 'static,
    {
        Self::from_config(&DetailsCacheConfig::default(), notifier, factory)
    }

    pub fn builder() -> DetailsCacheBuilder {
        DetailsCacheBuilder::new()
    }

    /// Expects a configuration that passed [`DetailsCacheConfig::validate`].
    pub(crate) fn from_config<F>(
        config: &DetailsCacheConfig,
        notifier: &LowMemoryNotifier,
        factory: F,
    ) -> Self
    where
        F: PlaceholderFactory<P> + 'static,
    {
        let details = ConcurrentLruCache::with_shards(config.details_capacity, config.shards);
        let placeholders =
            ConcurrentLruCache::with_shards(config.placeholder_capacity, config.shards);
        #[cfg(feature = "metrics")]
        let metrics = Arc::new(DetailsCacheMetrics::new());

        let subscription = {
            let details = details.clone();
            let placeholders = config
                .clear_placeholders_on_low_memory
                .then(|| placeholders.clone());
            #[cfg(feature = "metrics")]
            let metrics = Arc::clone(&metrics);

            notifier.register(move || {
                let evicted = details.clear();
                let dropped_placeholders = placeholders.as_ref().map_or(0, |p| p.clear());
                #[cfg(feature = "metrics")]
                metrics.record_low_memory_eviction(evicted);
                debug!(
                    evicted,
                    dropped_placeholders, "low memory: commit details cache cleared"
                );
            })
        };

        debug!(
            details_capacity = config.details_capacity,
            placeholder_capacity = config.placeholder_capacity,
            shards = config.shards,
            "commit details cache created"
        );

        DetailsCache {
            details,
            placeholders,
            factory: Box::new(factory),
            subscription: Mutex::new(Some(subscription)),
            disposed: AtomicBool::new(false),
            #[cfg(feature = "metrics")]
            metrics,
        }
    }

    /// Returns cached details, or the placeholder for `commit`, building it if
    /// needed. Never blocks on loading and never fails.
    pub fn get_cached_data_or_placeholder(&self, commit: CommitIndex) -> DetailsLookup<D, P> {
        if let Some(details) = self.get_cached_data(commit) {
            return DetailsLookup::Cached(details);
        }

        let factory = &self.factory;
        let (placeholder, created) = self
            .placeholders
            .get_or_insert_with(commit, |&id| factory.create(id));

        if created {
            trace!(%commit, "placeholder created");
            #[cfg(feature = "metrics")]
            self.metrics.record_placeholder_created();
        } else {
            #[cfg(feature = "metrics")]
            self.metrics.record_placeholder_hit();
        }

        DetailsLookup::Placeholder(placeholder)
    }

    /// Returns cached details for `commit`, if any. No loading side effect.
    pub fn get_cached_data(&self, commit: CommitIndex) -> Option<Arc<D>> {
        let found = self.details.get(&commit);

        #[cfg(feature = "metrics")]
        match found {
            Some(_) => self.metrics.record_detail_hit(),
            None => self.metrics.record_detail_miss(),
        }

        found
    }

    /// Returns the cached subset of `commits`. Missing commits are simply
    /// absent from the map.
    pub fn get_all_cached_data<I>(&self, commits: I) -> FxHashMap<CommitIndex, Arc<D>>
    where
        I: IntoIterator<Item = CommitIndex>,
    {
        let commits: Vec<CommitIndex> = commits.into_iter().collect();
        let found: FxHashMap<CommitIndex, Arc<D>> = self
            .details
            .get_many(commits.iter().copied())
            .into_iter()
            .collect();

        #[cfg(feature = "metrics")]
        for commit in &commits {
            if found.contains_key(commit) {
                self.metrics.record_detail_hit();
            } else {
                self.metrics.record_detail_miss();
            }
        }

        found
    }

    /// Stores fully loaded details, replacing any previous entry. Returns
    /// the replaced details.
    pub fn save_in_cache(&self, commit: CommitIndex, details: D) -> Option<Arc<D>> {
        self.save_arc_in_cache(commit, Arc::new(details))
    }

    /// Like [`save_in_cache`](Self::save_in_cache) for details that are
    /// already shared.
    pub fn save_arc_in_cache(&self, commit: CommitIndex, details: Arc<D>) -> Option<Arc<D>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_save();
        self.details.insert_arc(commit, details)
    }

    /// Clears both tiers and unregisters from the low-memory notifier.
    ///
    /// The cache stays usable afterwards: lookups miss and placeholders are
    /// rebuilt on demand. Calling `dispose` again only clears.
    pub fn dispose(&self) {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        drop(self.subscription.lock().take());

        let details = self.details.clear();
        let placeholders = self.placeholders.clear();

        #[cfg(feature = "metrics")]
        self.metrics.record_dispose();
        debug!(details, placeholders, first, "commit details cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of cached details.
    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Maximum number of cached details.
    pub fn capacity(&self) -> usize {
        self.details.capacity()
    }

    pub fn placeholder_len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn placeholder_capacity(&self) -> usize {
        self.placeholders.capacity()
    }

    /// Details dropped to respect the capacity bound.
    pub fn evictions(&self) -> u64 {
        self.details.evictions()
    }
}

#[cfg(feature = "metrics")]
impl<D, P> DetailsCache<D, P>
where
    D: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    pub fn metrics_snapshot(&self) -> DetailsCacheMetricsSnapshot {
        DetailsCacheMetricsSnapshot {
            details_len: self.details.len(),
            details_capacity: self.details.capacity(),
            details_evicted: self.details.evictions(),
            placeholders_len: self.placeholders.len(),
            placeholder_capacity: self.placeholders.capacity(),
            placeholders_evicted: self.placeholders.evictions(),
            ..self.metrics.counters()
        }
    }
}

#[cfg(feature = "metrics")]
impl<D, P> MetricsSnapshotProvider<DetailsCacheMetricsSnapshot> for DetailsCache<D, P>
where
    D: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn snapshot(&self) -> DetailsCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl<D, P> fmt::Debug for DetailsCache<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailsCache")
            .field("details", &self.details)
            .field("placeholders", &self.placeholders)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Details cache of a commit log: full details with loading placeholders.
pub type CommitDetailsCache = DetailsCache<FullCommitDetails, LoadingDetails>;

/// Placeholder factory used by [`CommitDetailsCache`].
pub fn loading_placeholder(commit: CommitIndex) -> LoadingDetails {
    LoadingDetails::new(commit, 0)
}

impl DetailsCache<FullCommitDetails, LoadingDetails> {
    /// Default-sized cache producing [`LoadingDetails`] placeholders.
    pub fn for_commit_log(notifier: &LowMemoryNotifier) -> Self {
        Self::new(notifier, loading_placeholder)
    }

    /// Custom-sized cache producing [`LoadingDetails`] placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn for_commit_log_with_config(
        config: DetailsCacheConfig,
        notifier: &LowMemoryNotifier,
    ) -> Result<Self, ConfigError> {
        DetailsCacheBuilder::from_config(config).try_build(notifier, loading_placeholder)
    }
}
