//! The admission engine: request accounting, frequency-gated admission into
//! the segmented store, control-message handling and report generation.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────────────────┐
//!   │                             Engine<V>                              │
//!   │                                                                    │
//!   │  on_request(key) ─────► AccessAccountant.record ─► cache.fetch     │
//!   │                                                                    │
//!   │  on_response_arrival ─► AdmissionPolicy.offer                      │
//!   │     (key, value)          ├── FrequencySketch.increment            │
//!   │                           ├── θ gate (ThetaTable, SmallRng)        │
//!   │                           ├── frequency gate (full cache only)    │
//!   │                           └── SegmentedCache.insert                │
//!   │                                                                    │
//!   │  on_control(payload) ──► decode_theta_updates ─► ThetaTable.apply  │
//!   │                                                                    │
//!   │  flush() ──────────────► drain_deltas ─► encode_access_report      │
//!   │                                         └─► AccessReport           │
//!   │                                                                    │
//!   │  EngineStats  (counters for every path above)                      │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use tinyslru::engine::Engine;
//! use tinyslru::traits::CacheStrategy;
//! use tinyslru::Name;
//!
//! let mut engine: Engine<&str> = Engine::builder()
//!     .capacities(2, 2)
//!     .default_theta(1.0)
//!     .build();
//!
//! let key = Name::from("/video/seg1");
//! assert_eq!(engine.on_request(&key), None);
//! assert!(engine.on_response_arrival(key.clone(), "bytes").is_cached());
//! assert_eq!(engine.on_request(&key), Some(&"bytes"));
//!
//! let report = engine.flush().unwrap();
//! assert_eq!(report.name, Name::from("/fog/access-report/v=1"));
//! assert_eq!(report.records, 1);
//! ```

use std::marker::PhantomData;
#[cfg(feature = "concurrency")]
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::accountant::AccessAccountant;
use crate::codec::{decode_theta_updates, encode_access_report, AccessDelta};
use crate::ds::FrequencySketch;
use crate::error::{CodecError, ConfigError};
use crate::metrics::snapshot::EngineSnapshot;
use crate::metrics::stats::EngineStats;
use crate::metrics::traits::{AdmissionMetricsRecorder, MetricsSnapshotProvider};
use crate::name::Name;
use crate::policy::admission::{
    AdmissionOutcome, AdmissionPolicy, Rejection, ThetaTable, TieBreak, DEFAULT_THETA,
};
use crate::policy::slru::SegmentedCache;
use crate::report::{AccessReport, ReportTimer};
#[cfg(feature = "concurrency")]
use crate::traits::ConcurrentCache;
use crate::traits::CacheStrategy;

pub const DEFAULT_SKETCH_DEPTH: usize = 4;
pub const DEFAULT_SKETCH_WIDTH: usize = 2048;
pub const DEFAULT_PROBATION_CAPACITY: usize = 50;
pub const DEFAULT_PROTECTED_CAPACITY: usize = 50;
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REPORT_FRESHNESS: Duration = Duration::from_secs(1);
pub const DEFAULT_CONTROL_PREFIX: &str = "/fog/instruction";
pub const DEFAULT_REPORT_NAME: &str = "/fog/access-report";
pub const DEFAULT_RNG_SEED: u64 = 0x7155_11A2_D00D_F00D;

/// Which requests the accountant counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessCounting {
    /// Every request, whether served from cache or not.
    #[default]
    AllRequests,
    /// Only requests that missed the cache.
    MissesOnly,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine parameters. [`Default`] gives the stock deployment values.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sketch_depth: usize,
    pub sketch_width: usize,
    pub probation_capacity: usize,
    pub protected_capacity: usize,
    /// θ for keys the controller never addressed.
    pub default_theta: f64,
    pub tie_break: TieBreak,
    pub access_counting: AccessCounting,
    /// Period between report flushes; consumed by the driver's
    /// [`ReportTimer`](crate::report::ReportTimer).
    pub report_interval: Duration,
    pub report_freshness: Duration,
    /// Responses under this prefix are control messages.
    pub control_prefix: Name,
    /// Reports are named `<report_name>/v=<seq>`.
    pub report_name: Name,
    pub rng_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sketch_depth: DEFAULT_SKETCH_DEPTH,
            sketch_width: DEFAULT_SKETCH_WIDTH,
            probation_capacity: DEFAULT_PROBATION_CAPACITY,
            protected_capacity: DEFAULT_PROTECTED_CAPACITY,
            default_theta: DEFAULT_THETA,
            tie_break: TieBreak::default(),
            access_counting: AccessCounting::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            report_freshness: DEFAULT_REPORT_FRESHNESS,
            control_prefix: Name::from(DEFAULT_CONTROL_PREFIX),
            report_name: Name::from(DEFAULT_REPORT_NAME),
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl EngineConfig {
    /// Checks the settings that no component constructor validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_interval.is_zero() {
            return Err(ConfigError::new("report interval must be greater than zero"));
        }
        if self.control_prefix.is_empty() {
            return Err(ConfigError::new("control prefix must not be empty"));
        }
        if self.report_name.is_empty() {
            return Err(ConfigError::new("report name must not be empty"));
        }
        Ok(())
    }
}

/// Fluent construction of an [`Engine`].
///
/// ```
/// use std::time::Duration;
/// use tinyslru::engine::{AccessCounting, Engine};
/// use tinyslru::policy::admission::TieBreak;
///
/// let engine = Engine::<Vec<u8>>::builder()
///     .sketch(4, 1024)
///     .capacities(10, 30)
///     .tie_break(TieBreak::AdmitOnTie)
///     .access_counting(AccessCounting::MissesOnly)
///     .report_interval(Duration::from_secs(5))
///     .try_build();
/// assert!(engine.is_ok());
///
/// let bad = Engine::<Vec<u8>>::builder().capacities(0, 0).try_build();
/// assert!(bad.is_err());
/// ```
pub struct EngineBuilder<V> {
    config: EngineConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V> EngineBuilder<V> {
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            _value: PhantomData,
        }
    }

    pub fn sketch(mut self, depth: usize, width: usize) -> Self {
        self.config.sketch_depth = depth;
        self.config.sketch_width = width;
        self
    }

    pub fn capacities(mut self, probation: usize, protected: usize) -> Self {
        self.config.probation_capacity = probation;
        self.config.protected_capacity = protected;
        self
    }

    pub fn default_theta(mut self, theta: f64) -> Self {
        self.config.default_theta = theta;
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.tie_break = tie_break;
        self
    }

    pub fn access_counting(mut self, counting: AccessCounting) -> Self {
        self.config.access_counting = counting;
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.report_interval = interval;
        self
    }

    pub fn report_freshness(mut self, freshness: Duration) -> Self {
        self.config.report_freshness = freshness;
        self
    }

    pub fn control_prefix(mut self, prefix: impl Into<Name>) -> Self {
        self.config.control_prefix = prefix.into();
        self
    }

    pub fn report_name(mut self, name: impl Into<Name>) -> Self {
        self.config.report_name = name.into();
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = seed;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// # Panics
    ///
    /// Panics on an invalid configuration. See [`try_build`](Self::try_build).
    pub fn build(self) -> Engine<V> {
        match self.try_build() {
            Ok(engine) => engine,
            Err(e) => panic!("{}", e),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero total or probation capacity, zero
    /// sketch dimensions, a default θ outside `[0, 1]`, a zero report
    /// interval, or an empty control prefix or report name.
    pub fn try_build(self) -> Result<Engine<V>, ConfigError> {
        Engine::try_new(self.config)
    }
}

impl<V> Default for EngineBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for EngineBuilder<V> {
    fn clone(&self) -> Self {
        Self::from_config(self.config.clone())
    }
}

impl<V> std::fmt::Debug for EngineBuilder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Single-threaded admission engine. See the [module docs](self).
pub struct Engine<V> {
    cache: SegmentedCache<Name, V>,
    admission: AdmissionPolicy,
    accountant: AccessAccountant<Name>,
    stats: EngineStats,
    config: EngineConfig,
    report_seq: u64,
}

impl<V> Engine<V> {
    pub fn builder() -> EngineBuilder<V> {
        EngineBuilder::new()
    }

    /// # Panics
    ///
    /// Panics on an invalid configuration. See [`try_new`](Self::try_new).
    pub fn new(config: EngineConfig) -> Self {
        match Self::try_new(config) {
            Ok(engine) => engine,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = SegmentedCache::try_new(config.probation_capacity, config.protected_capacity)?;
        let sketch = FrequencySketch::try_new(config.sketch_depth, config.sketch_width)?;
        let thetas = ThetaTable::try_new(config.default_theta)?;
        let admission = AdmissionPolicy::new(sketch, thetas, config.tie_break, config.rng_seed);

        debug!(
            probation = config.probation_capacity,
            protected = config.protected_capacity,
            sketch_depth = config.sketch_depth,
            sketch_width = config.sketch_width,
            default_theta = config.default_theta,
            "engine created"
        );

        Ok(Self {
            cache,
            admission,
            accountant: AccessAccountant::new(),
            stats: EngineStats::default(),
            config,
            report_seq: 0,
        })
    }

    /// Counts the request and serves it from cache if resident.
    pub fn on_request(&mut self, key: &Name) -> Option<&V> {
        let counting = self.config.access_counting;
        match self.cache.fetch(key) {
            Some(value) => {
                self.stats.record_request_hit();
                if counting == AccessCounting::AllRequests {
                    self.accountant.record(key);
                }
                trace!(key = %key, "cache hit");
                Some(value)
            },
            None => {
                self.stats.record_request_miss();
                self.accountant.record(key);
                trace!(key = %key, "cache miss");
                None
            },
        }
    }

    /// Offers a fetched value for caching.
    ///
    /// Control-prefixed keys are never cached; they return
    /// [`AdmissionOutcome::ControlMessage`] without touching any state.
    pub fn on_response_arrival(&mut self, key: Name, value: V) -> AdmissionOutcome {
        if self.is_control(&key) {
            debug!(key = %key, "control response bypasses cache");
            return AdmissionOutcome::ControlMessage;
        }

        self.stats.record_response();
        let outcome = self.admission.offer(&mut self.cache, key, value);
        match &outcome {
            AdmissionOutcome::Admitted { evicted } => self.stats.record_admission(evicted.is_some()),
            AdmissionOutcome::Refreshed => self.stats.record_refresh(),
            AdmissionOutcome::Rejected(Rejection::Theta { .. }) => self.stats.record_theta_rejection(),
            AdmissionOutcome::Rejected(Rejection::Frequency { .. }) => {
                self.stats.record_frequency_rejection()
            },
            AdmissionOutcome::ControlMessage => {},
        }
        outcome
    }

    /// True if `key` falls under the reserved control prefix.
    pub fn is_control(&self, key: &Name) -> bool {
        key.has_prefix(&self.config.control_prefix)
    }

    /// Decodes a θ batch and applies it atomically, returning the number of
    /// entries written. A malformed payload changes nothing.
    pub fn on_control(&mut self, payload: &[u8]) -> Result<usize, CodecError> {
        match decode_theta_updates(payload) {
            Ok(updates) => {
                let applied = self
                    .admission
                    .thetas_mut()
                    .apply(updates.into_iter().map(|u| (u.key, u.theta)));
                self.stats.record_control_applied(applied);
                info!(updates = applied, "theta batch applied");
                Ok(applied)
            },
            Err(e) => {
                self.stats.record_control_malformed();
                warn!(error = %e, bytes = payload.len(), "malformed control payload dropped");
                Err(e)
            },
        }
    }

    /// Drains unreported deltas into one encoded report.
    ///
    /// Returns `None`, and emits nothing, when no key has a non-zero delta.
    pub fn flush(&mut self) -> Option<AccessReport> {
        let deltas = self.accountant.drain_deltas();
        if deltas.is_empty() {
            self.stats.record_empty_flush();
            debug!("no access deltas, report suppressed");
            return None;
        }

        let records: Vec<AccessDelta> = deltas
            .into_iter()
            .map(|(key, count)| AccessDelta::new(key, count))
            .collect();
        let payload = encode_access_report(&records);

        self.report_seq += 1;
        let name = self
            .config
            .report_name
            .append(&format!("v={}", self.report_seq));

        self.stats.record_report(records.len());
        info!(
            name = %name,
            entries = records.len(),
            bytes = payload.len(),
            "access report emitted"
        );

        Some(AccessReport {
            name,
            payload,
            freshness: self.config.report_freshness,
            records: records.len(),
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn cache(&self) -> &SegmentedCache<Name, V> {
        &self.cache
    }

    #[inline]
    pub fn admission(&self) -> &AdmissionPolicy {
        &self.admission
    }

    #[inline]
    pub fn accountant(&self) -> &AccessAccountant<Name> {
        &self.accountant
    }

    #[inline]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Effective θ for `key`.
    pub fn theta_for(&self, key: &Name) -> f64 {
        self.admission.thetas().theta_for(key)
    }

    /// Sketch estimate for `key`.
    pub fn estimate(&self, key: &Name) -> u32 {
        self.admission.estimate(key)
    }

    /// A stopped timer for this engine's validated report interval.
    pub fn report_timer(&self) -> ReportTimer {
        ReportTimer::new(self.config.report_interval)
    }

    /// Number of reports emitted so far.
    pub fn reports_emitted(&self) -> u64 {
        self.report_seq
    }
}

impl<V> Engine<V>
where
    V: AsRef<[u8]>,
{
    /// Dispatches a response: control payloads to [`on_control`](Self::on_control),
    /// everything else to [`on_response_arrival`](Self::on_response_arrival).
    ///
    /// Malformed control payloads are counted and logged, and still yield
    /// [`AdmissionOutcome::ControlMessage`].
    pub fn route_response(&mut self, key: Name, value: V) -> AdmissionOutcome {
        if self.is_control(&key) {
            // Failure is already logged and counted.
            let _ = self.on_control(value.as_ref());
            return AdmissionOutcome::ControlMessage;
        }
        self.on_response_arrival(key, value)
    }
}

impl<V> CacheStrategy<V> for Engine<V> {
    fn on_request(&mut self, key: &Name) -> Option<&V> {
        Engine::on_request(self, key)
    }

    fn on_response_arrival(&mut self, key: Name, value: V) -> AdmissionOutcome {
        Engine::on_response_arrival(self, key, value)
    }

    fn flush(&mut self) -> Option<AccessReport> {
        Engine::flush(self)
    }
}

impl<V> MetricsSnapshotProvider<EngineSnapshot> for Engine<V> {
    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::from_parts(
            &self.stats,
            self.cache.metrics_snapshot(),
            self.admission.thetas().len(),
            self.accountant.tracked_keys(),
            self.admission.sketch().counter_count(),
        )
    }
}

impl<V> std::fmt::Debug for Engine<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cache", &self.cache)
            .field("admission", &self.admission)
            .field("tracked_keys", &self.accountant.tracked_keys())
            .field("reports_emitted", &self.report_seq)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ConcurrentEngine
// ---------------------------------------------------------------------------

/// Thread-safe handle to an [`Engine`] behind one `parking_lot::Mutex`.
///
/// Every call takes the lock for its full duration, so the cache, the sketch
/// and the θ table are always observed and mutated together. Hits return a
/// clone of the cached value.
///
/// ```
/// use std::thread;
/// use tinyslru::engine::{ConcurrentEngine, Engine};
/// use tinyslru::Name;
///
/// let engine = ConcurrentEngine::new(Engine::<u32>::builder().default_theta(1.0).build());
/// let handles: Vec<_> = (0..4u32)
///     .map(|t| {
///         let engine = engine.clone();
///         thread::spawn(move || {
///             let key = Name::from(format!("/t/{}", t));
///             engine.on_request(&key);
///             engine.on_response_arrival(key, t);
///         })
///     })
///     .collect();
/// for h in handles {
///     h.join().unwrap();
/// }
/// assert_eq!(engine.stats().requests, 4);
/// ```
#[cfg(feature = "concurrency")]
pub struct ConcurrentEngine<V> {
    inner: Arc<Mutex<Engine<V>>>,
}

#[cfg(feature = "concurrency")]
impl<V> Clone for ConcurrentEngine<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<V> ConcurrentEngine<V> {
    pub fn new(engine: Engine<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn on_response_arrival(&self, key: Name, value: V) -> AdmissionOutcome {
        self.inner.lock().on_response_arrival(key, value)
    }

    pub fn on_control(&self, payload: &[u8]) -> Result<usize, CodecError> {
        self.inner.lock().on_control(payload)
    }

    pub fn flush(&self) -> Option<AccessReport> {
        self.inner.lock().flush()
    }

    pub fn is_control(&self, key: &Name) -> bool {
        self.inner.lock().is_control(key)
    }

    pub fn stats(&self) -> EngineStats {
        self.inner.lock().stats().clone()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.lock().snapshot()
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<V>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(feature = "concurrency")]
impl<V: Clone> ConcurrentEngine<V> {
    /// Counts the request and returns a clone of the cached value on a hit.
    pub fn on_request(&self, key: &Name) -> Option<V> {
        self.inner.lock().on_request(key).cloned()
    }
}

#[cfg(feature = "concurrency")]
impl<V: AsRef<[u8]>> ConcurrentEngine<V> {
    pub fn route_response(&self, key: Name, value: V) -> AdmissionOutcome {
        self.inner.lock().route_response(key, value)
    }
}

#[cfg(feature = "concurrency")]
impl<V: Send> ConcurrentCache for ConcurrentEngine<V> {}

#[cfg(feature = "concurrency")]
impl<V> std::fmt::Debug for ConcurrentEngine<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_theta_updates, ThetaUpdate};
    use crate::policy::slru::Segment;

    fn n(s: &str) -> Name {
        Name::from(s)
    }

    fn deterministic(prob: usize, prot: usize) -> Engine<&'static str> {
        Engine::builder().capacities(prob, prot).default_theta(1.0).build()
    }

    /// Request, then immediately deliver the response on a miss.
    fn serve(engine: &mut Engine<&'static str>, key: &str) -> Option<AdmissionOutcome> {
        let key = n(key);
        if engine.on_request(&key).is_some() {
            return None;
        }
        Some(engine.on_response_arrival(key, "data"))
    }

    mod configuration {
        use super::*;

        #[test]
        fn defaults_match_deployment() {
            let c = EngineConfig::default();
            assert_eq!((c.sketch_depth, c.sketch_width), (4, 2048));
            assert_eq!((c.probation_capacity, c.protected_capacity), (50, 50));
            assert_eq!(c.default_theta, 0.5);
            assert_eq!(c.tie_break, TieBreak::RejectOnTie);
            assert_eq!(c.access_counting, AccessCounting::AllRequests);
            assert_eq!(c.report_interval, Duration::from_secs(10));
            assert_eq!(c.report_freshness, Duration::from_secs(1));
            assert_eq!(c.control_prefix, n("/fog/instruction"));
            assert_eq!(c.report_name, n("/fog/access-report"));
        }

        #[test]
        fn invalid_settings_rejected() {
            let b = || Engine::<()>::builder();
            assert!(b().capacities(0, 0).try_build().is_err());
            assert!(b().capacities(0, 5).try_build().is_err());
            assert!(b().sketch(0, 16).try_build().is_err());
            assert!(b().sketch(4, 0).try_build().is_err());
            assert!(b().default_theta(1.5).try_build().is_err());
            assert!(b().default_theta(-0.1).try_build().is_err());
            assert!(b().report_interval(Duration::ZERO).try_build().is_err());
            assert!(b().control_prefix("").try_build().is_err());
            assert!(b().report_name("").try_build().is_err());
        }

        #[test]
        #[should_panic(expected = "report interval")]
        fn build_panics_on_invalid_config() {
            let _engine: Engine<()> = Engine::builder().report_interval(Duration::ZERO).build();
        }
    }

    mod request_path {
        use super::*;

        #[test]
        fn hits_and_misses_are_counted() {
            let mut engine = deterministic(2, 2);
            serve(&mut engine, "/a");
            serve(&mut engine, "/a");
            let stats = engine.stats();
            assert_eq!(stats.requests, 2);
            assert_eq!(stats.hits, 1);
            assert_eq!(stats.misses, 1);
            assert_eq!(engine.accountant().total(&n("/a")), 2);
        }

        #[test]
        fn misses_only_counting_skips_hits() {
            let mut engine: Engine<&str> = Engine::builder()
                .default_theta(1.0)
                .access_counting(AccessCounting::MissesOnly)
                .build();
            serve(&mut engine, "/a");
            serve(&mut engine, "/a");
            serve(&mut engine, "/a");
            assert_eq!(engine.accountant().total(&n("/a")), 1);
            assert_eq!(engine.stats().hits, 2);
        }

        #[test]
        fn hit_promotes_to_protected() {
            let mut engine = deterministic(2, 2);
            serve(&mut engine, "/a");
            assert_eq!(engine.cache().segment_of(&n("/a")), Some(Segment::Probation));
            serve(&mut engine, "/a");
            assert_eq!(engine.cache().segment_of(&n("/a")), Some(Segment::Protected));
        }
    }

    mod control_path {
        use super::*;

        #[test]
        fn control_prefix_detection() {
            let engine = deterministic(2, 2);
            assert!(engine.is_control(&n("/fog/instruction")));
            assert!(engine.is_control(&n("/fog/instruction/42")));
            assert!(!engine.is_control(&n("/fog/instructions")));
            assert!(!engine.is_control(&n("/video/a")));
        }

        #[test]
        fn control_response_is_never_cached() {
            let mut engine = deterministic(2, 2);
            let outcome = engine.on_response_arrival(n("/fog/instruction/1"), "payload");
            assert_eq!(outcome, AdmissionOutcome::ControlMessage);
            assert!(engine.cache().is_empty());
            assert_eq!(engine.stats().responses, 0);
            assert_eq!(engine.estimate(&n("/fog/instruction/1")), 0);
        }

        #[test]
        fn theta_batch_applies() {
            let mut engine = deterministic(2, 2);
            let payload = encode_theta_updates(&[
                ThetaUpdate::new(n("/a"), 0.0),
                ThetaUpdate::new(n("/b"), 0.3),
            ]);
            assert_eq!(engine.on_control(&payload), Ok(2));
            assert_eq!(engine.theta_for(&n("/a")), 0.0);
            assert_eq!(engine.theta_for(&n("/b")), 0.3);
            assert_eq!(engine.theta_for(&n("/c")), 1.0);

            // θ = 0 now blocks /a entirely.
            let outcome = serve(&mut engine, "/a");
            assert!(matches!(
                outcome,
                Some(AdmissionOutcome::Rejected(Rejection::Theta { .. }))
            ));
        }

        #[test]
        fn malformed_batch_changes_nothing() {
            let mut engine = deterministic(2, 2);
            let mut payload = encode_theta_updates(&[ThetaUpdate::new(n("/a"), 0.0)]);
            payload.truncate(payload.len() - 1);
            assert!(engine.on_control(&payload).is_err());
            assert_eq!(engine.theta_for(&n("/a")), 1.0);
            assert_eq!(engine.stats().malformed_control, 1);
        }

        #[test]
        fn route_response_dispatches_by_prefix() {
            let mut engine: Engine<Vec<u8>> = Engine::builder().default_theta(1.0).build();
            let payload = encode_theta_updates(&[ThetaUpdate::new(n("/x"), 0.25)]);
            assert_eq!(
                engine.route_response(n("/fog/instruction/7"), payload),
                AdmissionOutcome::ControlMessage
            );
            assert_eq!(engine.theta_for(&n("/x")), 0.25);

            let outcome = engine.route_response(n("/video/x"), b"frame".to_vec());
            assert!(outcome.is_cached());

            assert_eq!(
                engine.route_response(n("/fog/instruction/8"), vec![0xFF]),
                AdmissionOutcome::ControlMessage
            );
            assert_eq!(engine.stats().malformed_control, 1);
        }
    }

    mod reporting {
        use super::*;

        #[test]
        fn report_names_carry_sequence() {
            let mut engine = deterministic(2, 2);
            engine.on_request(&n("/a"));
            let first = engine.flush().unwrap();
            engine.on_request(&n("/a"));
            let second = engine.flush().unwrap();
            assert_eq!(first.name, n("/fog/access-report/v=1"));
            assert_eq!(second.name, n("/fog/access-report/v=2"));
            assert_eq!(first.freshness, Duration::from_secs(1));
        }

        #[test]
        fn timer_uses_configured_interval() {
            let engine: Engine<()> = Engine::builder()
                .report_interval(Duration::from_secs(3))
                .build();
            let timer = engine.report_timer();
            assert_eq!(timer.interval(), Duration::from_secs(3));
            assert!(!timer.is_running());
        }

        #[test]
        fn empty_flush_is_suppressed() {
            let mut engine = deterministic(2, 2);
            assert!(engine.flush().is_none());
            assert_eq!(engine.reports_emitted(), 0);
            assert_eq!(engine.stats().empty_flushes, 1);
        }

        #[test]
        fn report_payload_decodes_to_deltas() {
            let mut engine = deterministic(2, 2);
            for _ in 0..3 {
                engine.on_request(&n("/b"));
            }
            engine.on_request(&n("/a"));
            let report = engine.flush().unwrap();
            let records = report.decode().unwrap();
            assert_eq!(
                records,
                vec![AccessDelta::new(n("/a"), 1), AccessDelta::new(n("/b"), 3)]
            );
        }
    }

    mod observability {
        use super::*;

        #[test]
        fn snapshot_combines_engine_and_cache() {
            let mut engine = deterministic(2, 2);
            serve(&mut engine, "/a");
            serve(&mut engine, "/a");
            serve(&mut engine, "/b");
            let snap = engine.snapshot();
            assert_eq!(snap.requests, 3);
            assert_eq!(snap.admitted, 2);
            assert_eq!(snap.cache.protected_len, 1);
            assert_eq!(snap.cache.probation_len, 1);
            assert_eq!(snap.tracked_keys, 2);
            assert_eq!(snap.sketch_counters, 4 * 2048);
        }

        #[test]
        fn outcomes_partition_responses() {
            let mut engine: Engine<&str> = Engine::builder().capacities(2, 2).build();
            for i in 0..200 {
                let key = n(&format!("/k{}", i % 17));
                if engine.on_request(&key).is_none() {
                    engine.on_response_arrival(key, "v");
                }
            }
            let s = engine.stats();
            assert_eq!(
                s.responses,
                s.admitted + s.refreshed + s.rejected_by_theta + s.rejected_by_frequency
            );
            assert_eq!(s.requests, s.hits + s.misses);
        }
    }

    #[cfg(feature = "concurrency")]
    mod concurrency {
        use super::*;
        use std::thread;

        #[test]
        fn concurrent_engine_keeps_capacity_invariant() {
            let engine = ConcurrentEngine::new(
                Engine::<u64>::builder()
                    .capacities(4, 4)
                    .default_theta(1.0)
                    .build(),
            );
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let engine = engine.clone();
                    thread::spawn(move || {
                        for i in 0..500u64 {
                            let key = Name::from(format!("/k{}", (i * 7 + t) % 40));
                            if engine.on_request(&key).is_none() {
                                engine.on_response_arrival(key, i);
                            }
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            engine.with_engine(|e| {
                assert!(e.cache().probation_len() <= 4);
                assert!(e.cache().protected_len() <= 4);
                assert!(e.cache().check_invariants().is_ok());
            });
            assert_eq!(engine.stats().requests, 2000);
        }

        #[test]
        fn concurrent_engine_is_send_sync() {
            fn assert_concurrent<T: ConcurrentCache>() {}
            assert_concurrent::<ConcurrentEngine<Vec<u8>>>();
        }
    }
}
