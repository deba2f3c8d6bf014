//! Copyable point-in-time views of engine counters and gauges.

use crate::metrics::stats::{EngineStats, SlruMetrics};

/// Store-level counters plus segment gauges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SlruMetricsSnapshot {
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

    pub probation_len: usize,
    pub protected_len: usize,
    pub probation_capacity: usize,
    pub protected_capacity: usize,
}

impl SlruMetricsSnapshot {
    pub(crate) fn from_counters(
        m: &SlruMetrics,
        probation_len: usize,
        protected_len: usize,
        probation_capacity: usize,
        protected_capacity: usize,
    ) -> Self {
        Self {
            get_calls: m.get_calls,
            get_hits: m.get_hits,
            get_misses: m.get_misses,
            insert_calls: m.insert_calls,
            insert_updates: m.insert_updates,
            insert_new: m.insert_new,
            evict_calls: m.evict_calls,
            evicted_entries: m.evicted_entries,
            probation_to_protected: m.probation_to_protected,
            protected_demotions: m.protected_demotions,
            protected_evictions: m.protected_evictions,
            probation_len,
            protected_len,
            probation_capacity,
            protected_capacity,
        }
    }

    /// Combined occupancy of both segments.
    pub fn cache_len(&self) -> usize {
        self.probation_len + self.protected_len
    }

    /// Combined capacity of both segments.
    pub fn capacity(&self) -> usize {
        self.probation_capacity + self.protected_capacity
    }
}

/// Everything the engine can report about itself at one instant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
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

    pub cache: SlruMetricsSnapshot,

    /// Keys with an explicit θ entry.
    pub theta_entries: usize,
    /// Keys the accountant has ever seen.
    pub tracked_keys: usize,
    pub sketch_counters: usize,
}

impl EngineSnapshot {
    pub(crate) fn from_parts(
        stats: &EngineStats,
        cache: SlruMetricsSnapshot,
        theta_entries: usize,
        tracked_keys: usize,
        sketch_counters: usize,
    ) -> Self {
        Self {
            requests: stats.requests,
            hits: stats.hits,
            misses: stats.misses,
            responses: stats.responses,
            admitted: stats.admitted,
            refreshed: stats.refreshed,
            rejected_by_theta: stats.rejected_by_theta,
            rejected_by_frequency: stats.rejected_by_frequency,
            evictions: stats.evictions,
            control_messages: stats.control_messages,
            malformed_control: stats.malformed_control,
            theta_updates: stats.theta_updates,
            reports_emitted: stats.reports_emitted,
            report_records: stats.report_records,
            empty_flushes: stats.empty_flushes,
            cache,
            theta_entries,
            tracked_keys,
            sketch_counters,
        }
    }
}
