//! Configuration and builder for [`DetailsCache`].
//!
//! ## Defaults
//!
//! | Field                              | Default  | Description                                  |
//! |------------------------------------|----------|----------------------------------------------|
//! | `details_capacity`                 | 10,000   | Max loaded details kept in memory            |
//! | `placeholder_capacity`             | 1,000    | Max placeholders kept in memory              |
//! | `shards`                           | 4        | Lock shards per tier                         |
//! | `clear_placeholders_on_low_memory` | `false`  | Also drop placeholders on a low-memory signal|
//!
//! ## Example
//!
//! ```rust
//! use detailcache::builder::DetailsCacheBuilder;
//! use detailcache::details::{CommitIndex, FullCommitDetails, LoadingDetails};
//! use detailcache::low_memory::LowMemoryNotifier;
//!
//! let notifier = LowMemoryNotifier::new();
//! let cache = DetailsCacheBuilder::new()
//!     .details_capacity(500)
//!     .placeholder_capacity(50)
//!     .shards(2)
//!     .try_build::<FullCommitDetails, LoadingDetails, _>(&notifier, |id: CommitIndex| LoadingDetails::new(id, 0))
//!     .unwrap();
//!
//! assert_eq!(cache.capacity(), 500);
//! assert!(cache.get_cached_data(CommitIndex::new(1)).is_none());
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cache::DetailsCache;
use crate::error::ConfigError;
use crate::low_memory::LowMemoryNotifier;
use crate::traits::PlaceholderFactory;

pub const DEFAULT_DETAILS_CAPACITY: usize = 10_000;
pub const DEFAULT_PLACEHOLDER_CAPACITY: usize = 1_000;
pub const DEFAULT_SHARDS: usize = 4;

/// Sizing and behaviour of a [`DetailsCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DetailsCacheConfig {
    pub details_capacity: usize,
    pub placeholder_capacity: usize,
    pub shards: usize,
    pub clear_placeholders_on_low_memory: bool,
}

impl Default for DetailsCacheConfig {
    fn default() -> Self {
        Self {
            details_capacity: DEFAULT_DETAILS_CAPACITY,
            placeholder_capacity: DEFAULT_PLACEHOLDER_CAPACITY,
            shards: DEFAULT_SHARDS,
            clear_placeholders_on_low_memory: false,
        }
    }
}

impl DetailsCacheConfig {
    /// Checks that both tiers can hold at least one entry per shard.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero capacity, a zero shard count, or a
    /// shard count larger than either capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.details_capacity == 0 {
            return Err(ConfigError::new("details capacity must be greater than zero"));
        }
        if self.placeholder_capacity == 0 {
            return Err(ConfigError::new(
                "placeholder capacity must be greater than zero",
            ));
        }
        if self.shards == 0 {
            return Err(ConfigError::new("shard count must be greater than zero"));
        }
        let smallest = self.details_capacity.min(self.placeholder_capacity);
        if self.shards > smallest {
            return Err(ConfigError::new(format!(
                "shard count {} exceeds the smallest tier capacity {}",
                self.shards, smallest
            )));
        }
        Ok(())
    }
}

/// Fluent builder for [`DetailsCache`].
#[derive(Debug, Clone, Default)]
pub struct DetailsCacheBuilder {
    config: DetailsCacheConfig,
}

impl DetailsCacheBuilder {
    /// Starts from [`DetailsCacheConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one deserialized from a
    /// settings file.
    pub fn from_config(config: DetailsCacheConfig) -> Self {
        Self { config }
    }

    pub fn details_capacity(mut self, capacity: usize) -> Self {
        self.config.details_capacity = capacity;
        self
    }

    pub fn placeholder_capacity(mut self, capacity: usize) -> Self {
        self.config.placeholder_capacity = capacity;
        self
    }

    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    pub fn clear_placeholders_on_low_memory(mut self, enabled: bool) -> Self {
        self.config.clear_placeholders_on_low_memory = enabled;
        self
    }

    pub fn config(&self) -> &DetailsCacheConfig {
        &self.config
    }

    /// Builds the cache and registers it with `notifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn try_build<D, P, F>(
        self,
        notifier: &LowMemoryNotifier,
        factory: F,
    ) -> Result<DetailsCache<D, P>, ConfigError>
    where
        D: Send + Sync + 'static,
        P: Send + Sync + 'static,
        F: PlaceholderFactory<P> + 'static,
    {
        self.config.validate()?;
        Ok(DetailsCache::from_config(&self.config, notifier, factory))
    }

    /// Builds the cache and registers it with `notifier`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; see [`try_build`](Self::try_build).
    pub fn build<D, P, F>(self, notifier: &LowMemoryNotifier, factory: F) -> DetailsCache<D, P>
    where
        D: Send + Sync + 'static,
        P: Send + Sync + 'static,
        F: PlaceholderFactory<P> + 'static,
    {
        match self.try_build(notifier, factory) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }
}
