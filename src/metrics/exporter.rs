use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::DetailsCacheMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for details-cache snapshots.
///
/// Writes in the Prometheus text exposition format so it can be scraped by
/// Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", suffix, value);
    }

    fn write_gauge(&self, suffix: &str, value: u64) {
        self.write_metric("gauge", suffix, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<DetailsCacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &DetailsCacheMetricsSnapshot) {
        self.write_counter("detail_hits_total", snapshot.detail_hits);
        self.write_counter("detail_misses_total", snapshot.detail_misses);
        self.write_counter("placeholder_hits_total", snapshot.placeholder_hits);
        self.write_counter("placeholders_created_total", snapshot.placeholders_created);
        self.write_counter("saves_total", snapshot.saves);
        self.write_counter("low_memory_signals_total", snapshot.low_memory_signals);
        self.write_counter("low_memory_evicted_total", snapshot.low_memory_evicted);
        self.write_counter("disposals_total", snapshot.disposals);
        self.write_counter("details_evicted_total", snapshot.details_evicted);
        self.write_counter("placeholders_evicted_total", snapshot.placeholders_evicted);
        self.write_gauge("details_len", snapshot.details_len as u64);
        self.write_gauge("details_capacity", snapshot.details_capacity as u64);
        self.write_gauge("placeholders_len", snapshot.placeholders_len as u64);
        self.write_gauge("placeholder_capacity", snapshot.placeholder_capacity as u64);
    }
}
