use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::DetailsCacheMetricsSnapshot;
use crate::metrics::traits::DetailsMetricsRecorder;

/// Lock-free counters for a [`DetailsCache`](crate::cache::DetailsCache).
#[derive(Debug, Default)]
pub struct DetailsCacheMetrics {
    detail_hits: AtomicU64,
    detail_misses: AtomicU64,
    placeholder_hits: AtomicU64,
    placeholders_created: AtomicU64,
    saves: AtomicU64,
    low_memory_signals: AtomicU64,
    low_memory_evicted: AtomicU64,
    disposals: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DetailsCacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the counters into a snapshot. Gauges are left at zero for the
    /// cache to fill in.
    pub fn counters(&self) -> DetailsCacheMetricsSnapshot {
        DetailsCacheMetricsSnapshot {
            detail_hits: self.detail_hits.load(Ordering::Relaxed),
            detail_misses: self.detail_misses.load(Ordering::Relaxed),
            placeholder_hits: self.placeholder_hits.load(Ordering::Relaxed),
            placeholders_created: self.placeholders_created.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            low_memory_signals: self.low_memory_signals.load(Ordering::Relaxed),
            low_memory_evicted: self.low_memory_evicted.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
            ..DetailsCacheMetricsSnapshot::default()
        }
    }
}

impl DetailsMetricsRecorder for DetailsCacheMetrics {
    fn record_detail_hit(&self) {
        bump(&self.detail_hits);
    }

    fn record_detail_miss(&self) {
        bump(&self.detail_misses);
    }

    fn record_placeholder_hit(&self) {
        bump(&self.placeholder_hits);
    }

    fn record_placeholder_created(&self) {
        bump(&self.placeholders_created);
    }

    fn record_save(&self) {
        bump(&self.saves);
    }

    fn record_low_memory_eviction(&self, evicted: usize) {
        bump(&self.low_memory_signals);
        self.low_memory_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    fn record_dispose(&self) {
        bump(&self.disposals);
    }
}
