//! Counters, snapshots and export for the engine and its segmented store.
//!
//! Recording is always compiled in; the counters are plain `u64` fields with
//! no synchronization. The Prometheus exporter is behind the `metrics`
//! feature.

#[cfg(feature = "metrics")]
pub mod exporter;
pub mod snapshot;
pub mod stats;
pub mod traits;

pub use snapshot::{EngineSnapshot, SlruMetricsSnapshot};
pub use stats::{EngineStats, SlruMetrics};
