pub use crate::accountant::AccessAccountant;
pub use crate::codec::{AccessDelta, ThetaUpdate};
pub use crate::ds::{FrequencySketch, SlotArena, SlotId};
#[cfg(feature = "concurrency")]
pub use crate::engine::ConcurrentEngine;
pub use crate::engine::{AccessCounting, Engine, EngineBuilder, EngineConfig};
pub use crate::error::{CodecError, ConfigError, InvariantError};
#[cfg(feature = "metrics")]
pub use crate::metrics::exporter::PrometheusTextExporter;
pub use crate::metrics::snapshot::{EngineSnapshot, SlruMetricsSnapshot};
pub use crate::metrics::traits::{MetricsExporter, MetricsSnapshotProvider};
pub use crate::name::Name;
pub use crate::policy::admission::{AdmissionOutcome, AdmissionPolicy, Rejection, ThetaTable, TieBreak};
pub use crate::policy::slru::{Segment, SegmentedCache};
pub use crate::report::{AccessReport, DestinationFilter, ManualScheduler, ReportSink, ReportTimer, Scheduler};
pub use crate::traits::{CacheStrategy, CoreCache, ReadOnlyCache, VictimSelection};
