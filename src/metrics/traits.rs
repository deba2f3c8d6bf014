//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are split into small traits so the
//! cache and admission code only ever write counters.
//!
//! ```text
//!   ┌─────────────────────────────┐        ┌─────────────────────────────┐
//!   │     CoreMetricsRecorder     │        │  AdmissionMetricsRecorder   │
//!   │  get_hit/get_miss/insert    │        │  request/response/admit     │
//!   │  evict                      │        │  reject/control/report      │
//!   └──────────────┬──────────────┘        └──────────────┬──────────────┘
//!                  ▼                                      ▼
//!   ┌─────────────────────────────┐        ┌─────────────────────────────┐
//!   │     SlruMetricsRecorder     │        │        EngineStats          │
//!   │  promote/demote/evict       │        │  (owned by Engine)          │
//!   └──────────────┬──────────────┘        └─────────────────────────────┘
//!                  ▼
//!            SlruMetrics (owned by SegmentedCache)
//!
//!   Consumption:
//!   MetricsSnapshotProvider<EngineSnapshot>  →  MetricsExporter<EngineSnapshot>
//! ```

/// Common counters for any cache store.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_call(&mut self);
    fn record_insert_new(&mut self);
    fn record_insert_update(&mut self);
    fn record_evict_call(&mut self);
    fn record_evicted_entry(&mut self);
}

/// Metrics for segment movement in the SLRU store.
pub trait SlruMetricsRecorder: CoreMetricsRecorder {
    fn record_probation_to_protected(&mut self);
    fn record_protected_demotion(&mut self);
    fn record_protected_eviction(&mut self);
}

/// Metrics for the request/response path, admission decisions and reporting.
pub trait AdmissionMetricsRecorder {
    fn record_request_hit(&mut self);
    fn record_request_miss(&mut self);
    fn record_response(&mut self);
    fn record_admission(&mut self, evicted: bool);
    fn record_refresh(&mut self);
    fn record_theta_rejection(&mut self);
    fn record_frequency_rejection(&mut self);
    fn record_control_applied(&mut self, updates: usize);
    fn record_control_malformed(&mut self);
    fn record_report(&mut self, records: usize);
    fn record_empty_flush(&mut self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
