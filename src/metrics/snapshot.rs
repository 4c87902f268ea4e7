#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DetailsCacheMetricsSnapshot {
    pub detail_hits: u64,
    pub detail_misses: u64,

    pub placeholder_hits: u64,
    pub placeholders_created: u64,

    pub saves: u64,

    pub low_memory_signals: u64,
    pub low_memory_evicted: u64, // primary entries dropped by low-memory signals
    pub disposals: u64,

    // gauges captured at snapshot time
    pub details_len: usize,
    pub details_capacity: usize,
    pub details_evicted: u64, // capacity evictions, primary tier
    pub placeholders_len: usize,
    pub placeholder_capacity: usize,
    pub placeholders_evicted: u64,
}

impl DetailsCacheMetricsSnapshot {
    /// Fraction of primary-tier lookups that hit, or `0.0` with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.detail_hits + self.detail_misses;
        if lookups == 0 {
            0.0
        } else {
            self.detail_hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_empty_and_mixed() {
        assert_eq!(DetailsCacheMetricsSnapshot::default().hit_rate(), 0.0);

        let snapshot = DetailsCacheMetricsSnapshot {
            detail_hits: 3,
            detail_misses: 1,
            ..Default::default()
        };
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
