//! # Metrics Traits
//!
//! ```text
//!   ┌────────────────────────────┐
//!   │   DetailsMetricsRecorder   │  written by DetailsCache (&self, atomics)
//!   └─────────────┬──────────────┘
//!                 │
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Recorders take `&self` because the details cache is shared between
//! threads without an outer lock; implementations use atomic counters.

/// Counters for the two-tier details cache.
pub trait DetailsMetricsRecorder {
    /// A lookup found loaded details in the primary tier.
    fn record_detail_hit(&self);
    /// A lookup found nothing in the primary tier.
    fn record_detail_miss(&self);
    /// A placeholder lookup reused an existing placeholder.
    fn record_placeholder_hit(&self);
    /// A placeholder lookup had to build a new placeholder.
    fn record_placeholder_created(&self);
    fn record_save(&self);
    /// The low-memory signal cleared `evicted` primary entries.
    fn record_low_memory_eviction(&self, evicted: usize);
    fn record_dispose(&self);
}

/// Produces a point-in-time copy of a component's metrics.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Publishes snapshots to a monitoring backend.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
