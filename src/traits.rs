//! # Collaborator Traits
//!
//! Seams between the details cache and the rest of a commit log:
//!
//! ```text
//!   ┌──────────────────────┐   create(index)    ┌──────────────────────┐
//!   │ PlaceholderFactory<P>│ ◄───────────────── │   DetailsCache<D, P> │
//!   └──────────────────────┘                    └──────────▲───────────┘
//!                                                          │ save_in_cache
//!   ┌──────────────────────┐   commit_id(index) ┌──────────┴───────────┐
//!   │    CommitStorage     │ ◄───────────────── │  CommitDetailsGetter │
//!   └──────────────────────┘                    └──────────┬───────────┘
//!                                                          │ read_full_details
//!                                               ┌──────────▼───────────┐
//!                                               │     LogProvider      │ (one per root)
//!                                               └──────────────────────┘
//! ```
//!
//! | Trait                 | Used by               | Purpose                                 |
//! |-----------------------|-----------------------|-----------------------------------------|
//! | `PlaceholderFactory`  | `DetailsCache`        | Build the stand-in for an uncached id   |
//! | `CommitStorage`       | `CommitDetailsGetter` | Resolve a commit index to hash + root   |
//! | `LogProvider`         | `CommitDetailsGetter` | Read full details from a VCS backend    |
//!
//! All traits are object safe and require `Send + Sync`: the cache and getter
//! are shared across threads.

use crate::details::{CommitHash, CommitId, CommitIndex, FullCommitDetails, VcsRoot};
use crate::error::BoxError;

/// Builds placeholder values for commits whose details are not cached.
///
/// Construction must not fail and should be cheap: it runs while the
/// placeholder shard's write lock is held.
///
/// Any `Fn(CommitIndex) -> P + Send + Sync` closure is a factory:
///
/// ```
/// use detailcache::details::{CommitIndex, LoadingDetails};
/// use detailcache::traits::PlaceholderFactory;
///
/// let factory = |commit: CommitIndex| LoadingDetails::new(commit, 0);
/// let placeholder = factory.create(CommitIndex::new(5));
/// assert_eq!(placeholder.commit(), CommitIndex::new(5));
/// ```
pub trait PlaceholderFactory<P>: Send + Sync {
    fn create(&self, commit: CommitIndex) -> P;
}

impl<P, F> PlaceholderFactory<P> for F
where
    F: Fn(CommitIndex) -> P + Send + Sync,
{
    #[inline]
    fn create(&self, commit: CommitIndex) -> P {
        self(commit)
    }
}

/// Maps commit indices to the commit ids they were assigned for.
pub trait CommitStorage: Send + Sync {
    /// Returns the commit id for `commit`, or `None` if the index is unknown.
    fn commit_id(&self, commit: CommitIndex) -> Option<CommitId>;
}

/// Reads full commit details from one kind of VCS backend.
pub trait LogProvider: Send + Sync {
    /// Reads details for `hashes` under `root`, handing each record to
    /// `consumer` as soon as it is available.
    ///
    /// Records may arrive in any order. A provider may deliver some records
    /// and then fail; delivered records are still cached by the caller.
    fn read_full_details(
        &self,
        root: &VcsRoot,
        hashes: &[CommitHash],
        consumer: &mut dyn FnMut(FullCommitDetails),
    ) -> Result<(), BoxError>;
}
