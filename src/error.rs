//! Error types for the detailcache library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity, more shards than entries).
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` methods).
//! - [`LoadError`]: Returned by the loading path when commit details cannot be
//!   fetched from a log provider. The cache itself never fails.
//!
//! ## Example Usage
//!
//! ```
//! use detailcache::error::ConfigError;
//! use detailcache::policy::lru::ConcurrentLruCache;
//!
//! let cache: Result<ConcurrentLruCache<u32, String>, ConfigError> =
//!     ConcurrentLruCache::try_with_shards(100, 4);
//! assert!(cache.is_ok());
//!
//! // More shards than entries is caught without panicking
//! let bad = ConcurrentLruCache::<u32, String>::try_with_shards(2, 8);
//! assert!(bad.is_err());
//! ```

use thiserror::Error;

use crate::details::{CommitHash, CommitIndex, VcsRoot};

/// Boxed error produced by external collaborators such as log providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`LruCore::check_invariants`](crate::policy::lru::LruCore::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// # Example
///
/// ```
/// use detailcache::builder::DetailsCacheConfig;
///
/// let config = DetailsCacheConfig {
///     details_capacity: 0,
///     ..DetailsCacheConfig::default()
/// };
/// let err = config.validate().unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Error returned by [`CommitDetailsGetter::load_commits_data`](crate::getter::CommitDetailsGetter::load_commits_data).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The commit storage has no commit id for the requested index.
    #[error("commit {0} is not present in the commit storage")]
    UnknownCommit(CommitIndex),

    /// No log provider is registered for the commit's repository root.
    #[error("no log provider registered for root {root}")]
    NoProvider { root: VcsRoot },

    /// The log provider failed while reading details.
    #[error("log provider for root {root} failed")]
    Provider {
        root: VcsRoot,
        #[source]
        source: BoxError,
    },

    /// The log provider finished without delivering a requested commit.
    #[error("log provider for root {root} returned no details for {hash}")]
    MissingDetails { root: VcsRoot, hash: CommitHash },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
