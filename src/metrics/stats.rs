//! Plain counter structs behind the recorder traits.
//!
//! Counters are `u64` and only ever incremented; snapshots copy them out.

use crate::metrics::traits::{AdmissionMetricsRecorder, CoreMetricsRecorder, SlruMetricsRecorder};

// ---------------------------------------------------------------------------
// SlruMetrics
// ---------------------------------------------------------------------------

/// Store-level counters owned by [`SegmentedCache`](crate::policy::slru::SegmentedCache).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlruMetrics {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub insert_calls: u64,
    pub insert_updates: u64,
    pub insert_new: u64,
    pub evict_calls: u64,
    pub evicted_entries: u64,
    pub probation_to_protected: u64,
    pub protected_demotions: u64,
    pub protected_evictions: u64,
}

impl CoreMetricsRecorder for SlruMetrics {
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }
    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }
    fn record_insert_call(&mut self) {
        self.insert_calls += 1;
    }
    fn record_insert_new(&mut self) {
        self.insert_new += 1;
    }
    fn record_insert_update(&mut self) {
        self.insert_updates += 1;
    }
    fn record_evict_call(&mut self) {
        self.evict_calls += 1;
    }
    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
    }
}

impl SlruMetricsRecorder for SlruMetrics {
    fn record_probation_to_protected(&mut self) {
        self.probation_to_protected += 1;
    }
    fn record_protected_demotion(&mut self) {
        self.protected_demotions += 1;
    }
    fn record_protected_eviction(&mut self) {
        self.protected_evictions += 1;
    }
}

// ---------------------------------------------------------------------------
// EngineStats
// ---------------------------------------------------------------------------

/// Engine-wide statistics: request traffic, admission decisions, control
/// traffic and reporting.
///
/// `requests == hits + misses` always holds. Every response passed through
/// admission lands in exactly one of `admitted`, `refreshed`,
/// `rejected_by_theta` or `rejected_by_frequency`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub responses: u64,
    pub admitted: u64,
    pub refreshed: u64,
    pub rejected_by_theta: u64,
    pub rejected_by_frequency: u64,
    pub evictions: u64,
    pub control_messages: u64,
    pub malformed_control: u64,
    pub theta_updates: u64,
    pub reports_emitted: u64,
    pub report_records: u64,
    pub empty_flushes: u64,
}

impl EngineStats {
    /// Fraction of requests served from cache, or `0.0` before any request.
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }
}

impl AdmissionMetricsRecorder for EngineStats {
    fn record_request_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }
    fn record_request_miss(&mut self) {
        self.requests += 1;
        self.misses += 1;
    }
    fn record_response(&mut self) {
        self.responses += 1;
    }
    fn record_admission(&mut self, evicted: bool) {
        self.admitted += 1;
        if evicted {
            self.evictions += 1;
        }
    }
    fn record_refresh(&mut self) {
        self.refreshed += 1;
    }
    fn record_theta_rejection(&mut self) {
        self.rejected_by_theta += 1;
    }
    fn record_frequency_rejection(&mut self) {
        self.rejected_by_frequency += 1;
    }
    fn record_control_applied(&mut self, updates: usize) {
        self.control_messages += 1;
        self.theta_updates += updates as u64;
    }
    fn record_control_malformed(&mut self) {
        self.control_messages += 1;
        self.malformed_control += 1;
    }
    fn record_report(&mut self, records: usize) {
        self.reports_emitted += 1;
        self.report_records += records as u64;
    }
    fn record_empty_flush(&mut self) {
        self.empty_flushes += 1;
    }
}
