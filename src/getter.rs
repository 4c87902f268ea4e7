//! Loads full commit details through log providers and keeps them in a
//! [`CommitDetailsCache`].
//!
//! ```text
//!   load_commits_data([i0, i1, i2, ...])
//!     │
//!     ├─ cache.get_all_cached_data ──────────► hits
//!     │
//!     ├─ misses ─► storage.commit_id(i) ─────► (root, hash)
//!     │             grouped by root (BTreeMap, deterministic order)
//!     │
//!     ├─ per root: provider.read_full_details(root, hashes, consumer)
//!     │             consumer ─► cache.save_in_cache(i, details)
//!     │
//!     ├─ details-loaded listeners(newly loaded indices)
//!     │
//!     └─ results in request order
//! ```
//!
//! Records a provider delivered before failing stay cached and are reported
//! to listeners; the call still returns the provider's error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::cache::{CommitDetailsCache, DetailsLookup};
use crate::details::{CommitHash, CommitIndex, FullCommitDetails, LoadingDetails, VcsRoot};
use crate::error::LoadError;
use crate::low_memory::LowMemoryNotifier;
use crate::traits::{CommitStorage, LogProvider};

type DetailsLoadedListener = Arc<dyn Fn(&[CommitIndex]) + Send + Sync>;

/// Listeners keyed by registration id, so delivery follows registration order.
#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<u64, DetailsLoadedListener>>,
}

/// Commit-details getter of a commit log.
pub struct CommitDetailsGetter<S> {
    cache: CommitDetailsCache,
    storage: Arc<S>,
    providers: FxHashMap<VcsRoot, Arc<dyn LogProvider>>,
    listeners: Arc<ListenerRegistry>,
}

impl<S: CommitStorage> CommitDetailsGetter<S> {
    /// Creates a getter with a default-sized cache registered with `notifier`.
    pub fn new<I>(storage: Arc<S>, providers: I, notifier: &LowMemoryNotifier) -> Self
    where
        I: IntoIterator<Item = (VcsRoot, Arc<dyn LogProvider>)>,
    {
        Self::with_cache(
            CommitDetailsCache::for_commit_log(notifier),
            storage,
            providers,
        )
    }

    /// Creates a getter around an existing cache.
    pub fn with_cache<I>(cache: CommitDetailsCache, storage: Arc<S>, providers: I) -> Self
    where
        I: IntoIterator<Item = (VcsRoot, Arc<dyn LogProvider>)>,
    {
        Self {
            cache,
            storage,
            providers: providers.into_iter().collect(),
            listeners: Arc::default(),
        }
    }

    pub fn cache(&self) -> &CommitDetailsCache {
        &self.cache
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn get_cached_data_or_placeholder(
        &self,
        commit: CommitIndex,
    ) -> DetailsLookup<FullCommitDetails, LoadingDetails> {
        self.cache.get_cached_data_or_placeholder(commit)
    }

    pub fn get_cached_data(&self, commit: CommitIndex) -> Option<Arc<FullCommitDetails>> {
        self.cache.get_cached_data(commit)
    }

    pub fn get_all_cached_data<I>(&self, commits: I) -> FxHashMap<CommitIndex, Arc<FullCommitDetails>>
    where
        I: IntoIterator<Item = CommitIndex>,
    {
        self.cache.get_all_cached_data(commits)
    }

    /// Registers `listener` to receive the indices of every batch of
    /// details loaded from a provider, until the returned subscription is
    /// dropped.
    pub fn add_details_loaded_listener<F>(&self, listener: F) -> DetailsLoadedSubscription
    where
        F: Fn(&[CommitIndex]) + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.listeners.write().insert(id, Arc::new(listener));
        debug!(listener = id, "details-loaded listener registered");
        DetailsLoadedSubscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.listeners.read().len()
    }

    /// Returns details for `commits` in request order, loading whatever is
    /// not cached.
    ///
    /// # Errors
    ///
    /// - [`LoadError::UnknownCommit`] if the storage cannot resolve an index.
    /// - [`LoadError::NoProvider`] if no provider serves a commit's root.
    /// - [`LoadError::Provider`] if a provider fails.
    /// - [`LoadError::MissingDetails`] if a provider skips a requested commit.
    pub fn load_commits_data(
        &self,
        commits: &[CommitIndex],
    ) -> Result<Vec<Arc<FullCommitDetails>>, LoadError> {
        let mut loaded = self.cache.get_all_cached_data(commits.iter().copied());

        let mut queued = FxHashSet::default();
        let mut by_root: BTreeMap<VcsRoot, Vec<(CommitIndex, CommitHash)>> = BTreeMap::new();
        for &commit in commits {
            if loaded.contains_key(&commit) || !queued.insert(commit) {
                continue;
            }
            let id = self
                .storage
                .commit_id(commit)
                .ok_or(LoadError::UnknownCommit(commit))?;
            by_root.entry(id.root).or_default().push((commit, id.hash));
        }

        if !by_root.is_empty() {
            debug!(
                requested = commits.len(),
                cached = loaded.len(),
                to_load = queued.len(),
                roots = by_root.len(),
                "loading commit details"
            );
        }

        let mut newly_loaded = Vec::new();
        let outcome = by_root
            .iter()
            .try_for_each(|(root, pending)| {
                self.load_root(root, pending, &mut loaded, &mut newly_loaded)
            });

        if !newly_loaded.is_empty() {
            self.notify_loaded(&newly_loaded);
        }
        outcome?;

        commits
            .iter()
            .map(|commit| {
                loaded
                    .get(commit)
                    .cloned()
                    .ok_or(LoadError::UnknownCommit(*commit))
            })
            .collect()
    }

    fn load_root(
        &self,
        root: &VcsRoot,
        pending: &[(CommitIndex, CommitHash)],
        loaded: &mut FxHashMap<CommitIndex, Arc<FullCommitDetails>>,
        newly_loaded: &mut Vec<CommitIndex>,
    ) -> Result<(), LoadError> {
        let provider = self
            .providers
            .get(root)
            .ok_or_else(|| LoadError::NoProvider { root: root.clone() })?;

        let wanted: FxHashMap<&CommitHash, CommitIndex> =
            pending.iter().map(|(commit, hash)| (hash, *commit)).collect();
        let hashes: Vec<CommitHash> = pending.iter().map(|(_, hash)| hash.clone()).collect();

        let read = provider.read_full_details(root, &hashes, &mut |details: FullCommitDetails| {
            let Some(&commit) = wanted.get(details.hash()) else {
                trace!(hash = %details.hash(), %root, "ignoring details of an unrequested commit");
                return;
            };
            let details = Arc::new(details);
            self.cache.save_arc_in_cache(commit, Arc::clone(&details));
            if loaded.insert(commit, details).is_none() {
                newly_loaded.push(commit);
            }
        });

        if let Err(source) = read {
            warn!(%root, error = %source, "log provider failed to read commit details");
            return Err(LoadError::Provider {
                root: root.clone(),
                source,
            });
        }

        match pending.iter().find(|(commit, _)| !loaded.contains_key(commit)) {
            Some((_, hash)) => Err(LoadError::MissingDetails {
                root: root.clone(),
                hash: hash.clone(),
            }),
            None => Ok(()),
        }
    }

    fn notify_loaded(&self, commits: &[CommitIndex]) {
        let listeners: Vec<DetailsLoadedListener> =
            self.listeners.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener(commits);
        }
    }

    /// Disposes the underlying cache.
    pub fn dispose(&self) {
        self.cache.dispose();
    }
}

impl<S> fmt::Debug for CommitDetailsGetter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roots: Vec<&VcsRoot> = self.providers.keys().collect();
        roots.sort();
        f.debug_struct("CommitDetailsGetter")
            .field("cache", &self.cache)
            .field("roots", &roots)
            .field("listeners", &self.listeners.listeners.read().len())
            .finish_non_exhaustive()
    }
}

/// Scoped registration returned by
/// [`CommitDetailsGetter::add_details_loaded_listener`]. Dropping it removes
/// the listener.
#[must_use = "dropping the subscription removes the listener"]
pub struct DetailsLoadedSubscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl DetailsLoadedSubscription {
    /// Removes the listener now. Equivalent to dropping the subscription.
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for DetailsLoadedSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.listeners.write().remove(&self.id).is_some() {
                debug!(listener = self.id, "details-loaded listener removed");
            }
        }
    }
}

impl fmt::Debug for DetailsLoadedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailsLoadedSubscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::{CommitId, VcsUser};
    use crate::error::BoxError;
    use crate::storage::InMemoryCommitStorage;
    use parking_lot::Mutex;

    fn details_for(root: &VcsRoot, hash: &CommitHash) -> FullCommitDetails {
        let author = VcsUser::new("Ada", "ada@example.com");
        FullCommitDetails {
            id: CommitId::new(hash.clone(), root.clone()),
            parents: Vec::new(),
            author: author.clone(),
            committer: author,
            author_time: 1_600_000_000_000,
            commit_time: 1_600_000_000_000,
            subject: format!("commit {}", hash),
            full_message: format!("commit {}\n\nbody", hash),
            changes: Vec::new(),
        }
    }

    /// Delivers requested commits in reverse order and records every call.
    #[derive(Default)]
    struct FakeProvider {
        calls: Mutex<Vec<Vec<CommitHash>>>,
        skip: Option<CommitHash>,
        extra: Option<CommitHash>,
        fail_after: Option<usize>,
    }

    impl LogProvider for FakeProvider {
        fn read_full_details(
            &self,
            root: &VcsRoot,
            hashes: &[CommitHash],
            consumer: &mut dyn FnMut(FullCommitDetails),
        ) -> Result<(), BoxError> {
            self.calls.lock().push(hashes.to_vec());
            if let Some(extra) = &self.extra {
                consumer(details_for(root, extra));
            }
            for (delivered, hash) in hashes.iter().rev().enumerate() {
                if self.fail_after == Some(delivered) {
                    return Err("repository is locked".into());
                }
                if self.skip.as_ref() == Some(hash) {
                    continue;
                }
                consumer(details_for(root, hash));
            }
            Ok(())
        }
    }

    struct Fixture {
        storage: Arc<InMemoryCommitStorage>,
        notifier: LowMemoryNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                storage: Arc::new(InMemoryCommitStorage::new()),
                notifier: LowMemoryNotifier::new(),
            }
        }

        fn index(&self, hash: &str, root: &str) -> CommitIndex {
            let id = CommitId::new(CommitHash::new(hash), VcsRoot::new(root));
            self.storage.commit_index(&id).unwrap()
        }

        fn getter(
            &self,
            providers: Vec<(&str, Arc<FakeProvider>)>,
        ) -> CommitDetailsGetter<InMemoryCommitStorage> {
            let providers = providers.into_iter().map(|(root, provider)| {
                (VcsRoot::new(root), provider as Arc<dyn LogProvider>)
            });
            CommitDetailsGetter::new(Arc::clone(&self.storage), providers, &self.notifier)
        }
    }

    #[test]
    fn loads_misses_and_returns_request_order() {
        let fx = Fixture::new();
        let a = fx.index("aaaa1111", "/repo");
        let b = fx.index("bbbb2222", "/repo");
        let c = fx.index("cccc3333", "/repo");
        let provider = Arc::new(FakeProvider::default());
        let getter = fx.getter(vec![("/repo", Arc::clone(&provider))]);

        let result = getter.load_commits_data(&[c, a, b]).unwrap();
        let hashes: Vec<&str> = result.iter().map(|d| d.hash().as_str()).collect();
        assert_eq!(hashes, ["cccc3333", "aaaa1111", "bbbb2222"]);

        assert_eq!(provider.calls.lock().len(), 1);
        assert!(getter.get_cached_data(a).is_some());
        assert!(getter.get_cached_data_or_placeholder(b).is_cached());
    }

    #[test]
    fn cached_commits_are_not_reloaded() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let b = fx.index("bbbb", "/repo");
        let provider = Arc::new(FakeProvider::default());
        let getter = fx.getter(vec![("/repo", Arc::clone(&provider))]);

        let first = getter.load_commits_data(&[a]).unwrap();
        let second = getter.load_commits_data(&[a, b]).unwrap();

        assert!(Arc::ptr_eq(&first[0], &second[0]));
        let calls = provider.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], vec![CommitHash::new("bbbb")]);
    }

    #[test]
    fn fully_cached_request_skips_providers() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let provider = Arc::new(FakeProvider::default());
        let getter = fx.getter(vec![("/repo", Arc::clone(&provider))]);

        getter.load_commits_data(&[a]).unwrap();
        getter.load_commits_data(&[a, a]).unwrap();
        assert_eq!(provider.calls.lock().len(), 1);
    }

    #[test]
    fn groups_requests_per_root() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/one");
        let b = fx.index("bbbb", "/two");
        let c = fx.index("cccc", "/one");
        let one = Arc::new(FakeProvider::default());
        let two = Arc::new(FakeProvider::default());
        let getter = fx.getter(vec![("/one", Arc::clone(&one)), ("/two", Arc::clone(&two))]);

        let result = getter.load_commits_data(&[a, b, c]).unwrap();
        assert_eq!(result[1].root(), &VcsRoot::new("/two"));
        assert_eq!(
            *one.calls.lock(),
            vec![vec![CommitHash::new("aaaa"), CommitHash::new("cccc")]]
        );
        assert_eq!(*two.calls.lock(), vec![vec![CommitHash::new("bbbb")]]);
    }

    #[test]
    fn duplicate_requests_are_loaded_once() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let provider = Arc::new(FakeProvider::default());
        let getter = fx.getter(vec![("/repo", Arc::clone(&provider))]);

        let result = getter.load_commits_data(&[a, a]).unwrap();
        assert_eq!(result.len(), 2);
        assert!(Arc::ptr_eq(&result[0], &result[1]));
        assert_eq!(provider.calls.lock()[0].len(), 1);
    }

    #[test]
    fn unrequested_records_are_ignored() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let stray = fx.index("ffff", "/repo");
        let provider = Arc::new(FakeProvider {
            extra: Some(CommitHash::new("ffff")),
            ..Default::default()
        });
        let getter = fx.getter(vec![("/repo", provider)]);

        getter.load_commits_data(&[a]).unwrap();
        assert!(getter.get_cached_data(stray).is_none());
        assert_eq!(getter.cache().len(), 1);
    }

    #[test]
    fn listeners_receive_newly_loaded_indices() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let b = fx.index("bbbb", "/repo");
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription =
            getter.add_details_loaded_listener(move |commits| sink.lock().push(commits.to_vec()));

        getter.load_commits_data(&[a]).unwrap();
        getter.load_commits_data(&[a, b]).unwrap();

        assert_eq!(*seen.lock(), vec![vec![a], vec![b]]);
    }

    #[test]
    fn dropped_listener_stops_receiving() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let b = fx.index("bbbb", "/repo");
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription =
            getter.add_details_loaded_listener(move |commits| sink.lock().push(commits.to_vec()));
        let kept = Arc::new(Mutex::new(Vec::new()));
        let kept_sink = Arc::clone(&kept);
        let _kept =
            getter.add_details_loaded_listener(move |commits| kept_sink.lock().push(commits.to_vec()));
        assert_eq!(getter.listener_count(), 2);

        getter.load_commits_data(&[a]).unwrap();
        subscription.unregister();
        assert_eq!(getter.listener_count(), 1);
        getter.load_commits_data(&[b]).unwrap();

        assert_eq!(*seen.lock(), vec![vec![a]]);
        assert_eq!(*kept.lock(), vec![vec![a], vec![b]]);
    }

    #[test]
    fn subscription_outlives_getter() {
        let fx = Fixture::new();
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);
        let subscription = getter.add_details_loaded_listener(|_| {});
        drop(getter);
        drop(subscription);
    }

    #[test]
    fn unknown_index_is_reported() {
        let fx = Fixture::new();
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);
        let err = getter.load_commits_data(&[CommitIndex::new(99)]).unwrap_err();
        assert!(matches!(err, LoadError::UnknownCommit(c) if c == CommitIndex::new(99)));
    }

    #[test]
    fn missing_provider_is_reported() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/elsewhere");
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);
        let err = getter.load_commits_data(&[a]).unwrap_err();
        assert!(matches!(err, LoadError::NoProvider { ref root } if root == &VcsRoot::new("/elsewhere")));
    }

    #[test]
    fn provider_failure_keeps_delivered_records() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let b = fx.index("bbbb", "/repo");
        // Reverse delivery: b arrives, then the provider fails before a.
        let provider = Arc::new(FakeProvider {
            fail_after: Some(1),
            ..Default::default()
        });
        let getter = fx.getter(vec![("/repo", provider)]);

        let err = getter.load_commits_data(&[a, b]).unwrap_err();
        assert!(matches!(err, LoadError::Provider { .. }));
        assert_eq!(
            std::error::Error::source(&err).map(|e| e.to_string()),
            Some("repository is locked".to_string())
        );
        assert!(getter.get_cached_data(b).is_some());
        assert!(getter.get_cached_data(a).is_none());
    }

    #[test]
    fn skipped_commit_is_reported() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let b = fx.index("bbbb", "/repo");
        let provider = Arc::new(FakeProvider {
            skip: Some(CommitHash::new("aaaa")),
            ..Default::default()
        });
        let getter = fx.getter(vec![("/repo", provider)]);

        let err = getter.load_commits_data(&[a, b]).unwrap_err();
        assert!(
            matches!(err, LoadError::MissingDetails { ref hash, .. } if hash == &CommitHash::new("aaaa"))
        );
        assert!(getter.get_cached_data(b).is_some());
    }

    #[test]
    fn dispose_clears_cache_and_unregisters() {
        let fx = Fixture::new();
        let a = fx.index("aaaa", "/repo");
        let getter = fx.getter(vec![("/repo", Arc::new(FakeProvider::default()))]);
        getter.load_commits_data(&[a]).unwrap();
        assert_eq!(fx.notifier.listener_count(), 1);

        getter.dispose();
        assert!(getter.get_cached_data(a).is_none());
        assert_eq!(fx.notifier.listener_count(), 0);
    }
}
