use std::io::Write;
use std::sync::Mutex;

use crate::metrics::snapshot::CacheMetricsSnapshot;

/// Sink for metrics snapshots.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}

/// Prometheus text exporter for cache metrics snapshots.
///
/// Writes the Prometheus text exposition format so it can be scraped
/// directly or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send + Sync> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send + Sync> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Unwraps the exporter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .expect("metrics exporter writer poisoned")
    }

    fn write_counter(&self, name: &str, value: u64) {
        let mut writer = self
            .writer
            .lock()
            .expect("metrics exporter writer poisoned");
        let _ = writeln!(writer, "# TYPE {} counter", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_gauge(&self, name: &str, value: u64) {
        let mut writer = self
            .writer
            .lock()
            .expect("metrics exporter writer poisoned");
        let _ = writeln!(writer, "# TYPE {} gauge", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send + Sync> MetricsExporter<CacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheMetricsSnapshot) {
        self.write_counter(&self.metric_name("lookup_hits_total"), snapshot.lookup_hits);
        self.write_counter(
            &self.metric_name("lookup_misses_total"),
            snapshot.lookup_misses,
        );
        self.write_counter(&self.metric_name("inserts_total"), snapshot.inserts);
        self.write_counter(
            &self.metric_name("replacements_total"),
            snapshot.replacements,
        );
        self.write_counter(&self.metric_name("evictions_total"), snapshot.evictions);
        self.write_counter(&self.metric_name("erases_total"), snapshot.erases);
        self.write_counter(&self.metric_name("pruned_total"), snapshot.pruned);
        self.write_gauge(&self.metric_name("usage_bytes"), snapshot.usage as u64);
        self.write_gauge(&self.metric_name("capacity_bytes"), snapshot.capacity as u64);
    }
}
