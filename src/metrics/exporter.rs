//! Prometheus text exporter for [`EngineSnapshot`].
//!
//! Writes the text exposition format so the output can be scraped directly
//! or forwarded to an OpenTelemetry collector.
//!
//! ```
//! use tinyslru::metrics::exporter::PrometheusTextExporter;
//! use tinyslru::metrics::snapshot::EngineSnapshot;
//! use tinyslru::metrics::traits::MetricsExporter;
//!
//! let exporter = PrometheusTextExporter::new("tinyslru", Vec::new());
//! exporter.export(&EngineSnapshot::default());
//! let text = String::from_utf8(exporter.into_inner()).unwrap();
//! assert!(text.contains("# TYPE tinyslru_requests_total counter"));
//! ```

use std::io::Write;
use std::sync::Mutex;

use crate::metrics::snapshot::EngineSnapshot;
use crate::metrics::traits::MetricsExporter;

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

    /// Consumes the exporter and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        // A panicked writer leaves at most a partial line; keep exporting.
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", suffix, value);
    }

    fn write_gauge(&self, suffix: &str, value: usize) {
        self.write_metric("gauge", suffix, value as u64);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<EngineSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, s: &EngineSnapshot) {
        self.write_counter("requests_total", s.requests);
        self.write_counter("hits_total", s.hits);
        self.write_counter("misses_total", s.misses);
        self.write_counter("responses_total", s.responses);
        self.write_counter("admitted_total", s.admitted);
        self.write_counter("refreshed_total", s.refreshed);
        self.write_counter("rejected_by_theta_total", s.rejected_by_theta);
        self.write_counter("rejected_by_frequency_total", s.rejected_by_frequency);
        self.write_counter("evictions_total", s.evictions);
        self.write_counter("control_messages_total", s.control_messages);
        self.write_counter("malformed_control_total", s.malformed_control);
        self.write_counter("theta_updates_total", s.theta_updates);
        self.write_counter("reports_emitted_total", s.reports_emitted);
        self.write_counter("report_records_total", s.report_records);
        self.write_counter("empty_flushes_total", s.empty_flushes);

        let c = &s.cache;
        self.write_counter("slru_get_calls_total", c.get_calls);
        self.write_counter("slru_get_hits_total", c.get_hits);
        self.write_counter("slru_get_misses_total", c.get_misses);
        self.write_counter("slru_insert_calls_total", c.insert_calls);
        self.write_counter("slru_insert_updates_total", c.insert_updates);
        self.write_counter("slru_insert_new_total", c.insert_new);
        self.write_counter("slru_evict_calls_total", c.evict_calls);
        self.write_counter("slru_evicted_entries_total", c.evicted_entries);
        self.write_counter("slru_probation_to_protected_total", c.probation_to_protected);
        self.write_counter("slru_protected_demotions_total", c.protected_demotions);
        self.write_counter("slru_protected_evictions_total", c.protected_evictions);
        self.write_gauge("slru_probation_len", c.probation_len);
        self.write_gauge("slru_protected_len", c.protected_len);
        self.write_gauge("slru_probation_capacity", c.probation_capacity);
        self.write_gauge("slru_protected_capacity", c.protected_capacity);

        self.write_gauge("theta_entries", s.theta_entries);
        self.write_gauge("tracked_keys", s.tracked_keys);
        self.write_gauge("sketch_counters", s.sketch_counters);
    }
}
