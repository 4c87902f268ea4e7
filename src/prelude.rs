pub use crate::builder::{DetailsCacheBuilder, DetailsCacheConfig};
pub use crate::cache::{CommitDetailsCache, DetailsCache, DetailsLookup, loading_placeholder};
pub use crate::details::{
    ChangeKind, CommitHash, CommitId, CommitIndex, FileChange, FullCommitDetails, LoadingDetails,
    VcsRoot, VcsUser,
};
pub use crate::error::{BoxError, ConfigError, InvariantError, LoadError};
pub use crate::getter::{CommitDetailsGetter, DetailsLoadedSubscription};
pub use crate::low_memory::{LowMemoryNotifier, LowMemorySubscription};
pub use crate::policy::lru::ConcurrentLruCache;
pub use crate::storage::InMemoryCommitStorage;
pub use crate::traits::{CommitStorage, LogProvider, PlaceholderFactory};

#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::DetailsCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
pub use crate::metrics::traits::MetricsSnapshotProvider;
