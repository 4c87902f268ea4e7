//! Cache metrics (feature `metrics`).
//!
//! Recording, snapshotting and exporting are split into separate pieces:
//!
//! - [`metrics_impl::DetailsCacheMetrics`]: lock-free counters written by the
//!   cache on every operation.
//! - [`snapshot::DetailsCacheMetricsSnapshot`]: a plain copy of the counters
//!   plus tier gauges, taken via [`traits::MetricsSnapshotProvider`].
//! - [`exporter::PrometheusTextExporter`]: publishes a snapshot in the
//!   Prometheus text exposition format.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::DetailsCacheMetrics;
pub use snapshot::DetailsCacheMetricsSnapshot;
pub use traits::{DetailsMetricsRecorder, MetricsExporter, MetricsSnapshotProvider};
