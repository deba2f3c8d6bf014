//! Periodic access reporting: scheduling, delivery and destination policy.
//!
//! The engine never owns a clock or a transport. A [`Scheduler`] hands out
//! one-shot [`TimerToken`]s; when one expires the driver passes it to
//! [`ReportTimer::fire`], which flushes the strategy, hands any report to a
//! [`ReportSink`] and arms the next period.
//!
//! ```text
//!   start ──► schedule_once(interval) ──► token
//!                                          │ expires
//!                                          ▼
//!                      fire(token) ── stale token? ──► ignored
//!                          │
//!                          ├── flush() → Some(report) ──► sink.send(report)
//!                          ├── flush() → None          ──► (nothing sent)
//!                          ▼
//!                   schedule_once(interval) ──► next token
//!
//!   shutdown ──► cancel(pending); later firings are ignored
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use tinyslru::engine::Engine;
//! use tinyslru::report::{AccessReport, ManualScheduler};
//! use tinyslru::traits::CacheStrategy;
//! use tinyslru::Name;
//!
//! let mut engine: Engine<Vec<u8>> = Engine::builder().build();
//! let mut scheduler = ManualScheduler::new();
//! let mut sent: Vec<AccessReport> = Vec::new();
//! let mut timer = engine.report_timer();
//!
//! timer.start(&mut scheduler);
//! engine.on_request(&Name::from("/v/a"));
//!
//! let fired = timer.run_until(Duration::from_secs(25), &mut scheduler, &mut engine, &mut sent);
//! assert_eq!(fired, 2);
//! assert_eq!(sent.len(), 1); // the second period had nothing to report
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, trace};

use crate::codec::{decode_access_report, AccessDelta};
use crate::error::{CodecError, ConfigError};
use crate::name::Name;
use crate::traits::CacheStrategy;

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Handle to one scheduled expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// One-shot timer service supplied by the environment.
pub trait Scheduler {
    /// Time elapsed since the scheduler's epoch.
    fn now(&self) -> Duration;

    /// Arms a timer that expires `delay` from now.
    fn schedule_once(&mut self, delay: Duration) -> TimerToken;

    /// Disarms `token`; returns `false` if it already fired or was cancelled.
    fn cancel(&mut self, token: TimerToken) -> bool;
}

/// Deterministic virtual-time scheduler for tests and simulations.
///
/// Time only moves through [`poll_until`](Self::poll_until).
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_token: u64,
    /// Armed timers ordered by `(deadline, token)` so ties fire in arming order.
    armed: BTreeSet<(Duration, TimerToken)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the earliest timer due at or before `until`, moving the clock
    /// to its deadline. When none is due the clock moves to `until` and
    /// `None` is returned.
    pub fn poll_until(&mut self, until: Duration) -> Option<TimerToken> {
        match self.armed.first().copied() {
            Some((deadline, token)) if deadline <= until => {
                self.armed.remove(&(deadline, token));
                self.now = self.now.max(deadline);
                trace!(token = token.0, deadline_ms = deadline.as_millis() as u64, "timer expired");
                Some(token)
            },
            _ => {
                self.now = self.now.max(until);
                None
            },
        }
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.armed.len()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule_once(&mut self, delay: Duration) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.armed.insert((self.now + delay, token));
        token
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        let entry = self.armed.iter().find(|(_, t)| *t == token).copied();
        match entry {
            Some(entry) => self.armed.remove(&entry),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One encoded access report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessReport {
    /// Target name, including the version component.
    pub name: Name,
    /// Encoded AccessVector.
    pub payload: Vec<u8>,
    /// How long downstream caches may treat the report as fresh.
    pub freshness: Duration,
    /// Number of `(key, delta)` records in `payload`.
    pub records: usize,
}

impl AccessReport {
    /// Decodes the payload back into its records.
    pub fn decode(&self) -> Result<Vec<AccessDelta>, CodecError> {
        decode_access_report(&self.payload)
    }
}

/// Outbound channel for reports.
pub trait ReportSink {
    fn send(&mut self, report: AccessReport);
}

/// Collects reports in memory.
impl ReportSink for Vec<AccessReport> {
    fn send(&mut self, report: AccessReport) {
        self.push(report);
    }
}

/// Recurring flush driver.
#[derive(Debug, Clone)]
pub struct ReportTimer {
    interval: Duration,
    pending: Option<TimerToken>,
    running: bool,
}

impl ReportTimer {
    /// # Panics
    ///
    /// Panics if `interval` is zero. See [`try_new`](Self::try_new).
    pub fn new(interval: Duration) -> Self {
        match Self::try_new(interval) {
            Ok(timer) => timer,
            Err(e) => panic!("{}", e),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero interval, which would re-arm at the
    /// same instant forever.
    pub fn try_new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::new("report interval must be greater than zero"));
        }
        Ok(Self {
            interval,
            pending: None,
            running: false,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Arms the first period. Calling it on a running timer re-arms it.
    pub fn start<S: Scheduler>(&mut self, scheduler: &mut S) {
        if let Some(old) = self.pending.take() {
            scheduler.cancel(old);
        }
        self.running = true;
        self.pending = Some(scheduler.schedule_once(self.interval));
    }

    /// Handles an expired token. Returns `true` if it was this timer's live
    /// token and a flush ran; stale or post-shutdown tokens are ignored.
    pub fn fire<S, C, V, K>(
        &mut self,
        token: TimerToken,
        scheduler: &mut S,
        strategy: &mut C,
        sink: &mut K,
    ) -> bool
    where
        S: Scheduler,
        C: CacheStrategy<V> + ?Sized,
        K: ReportSink + ?Sized,
    {
        if !self.running || self.pending != Some(token) {
            debug!(token = token.0, running = self.running, "stale report timer ignored");
            return false;
        }

        if let Some(report) = strategy.flush() {
            sink.send(report);
        }
        self.pending = Some(scheduler.schedule_once(self.interval));
        true
    }

    /// Fires every period due up to `until`, returning how many ran.
    pub fn run_until<C, V, K>(
        &mut self,
        until: Duration,
        scheduler: &mut ManualScheduler,
        strategy: &mut C,
        sink: &mut K,
    ) -> usize
    where
        C: CacheStrategy<V> + ?Sized,
        K: ReportSink + ?Sized,
    {
        let mut fired = 0;
        while let Some(token) = scheduler.poll_until(until) {
            if self.fire(token, scheduler, strategy, sink) {
                fired += 1;
            }
        }
        fired
    }

    /// Cancels the pending period. Tokens that expire afterwards are ignored.
    pub fn shutdown<S: Scheduler>(&mut self, scheduler: &mut S) {
        if let Some(token) = self.pending.take() {
            scheduler.cancel(token);
        }
        self.running = false;
    }
}

// ---------------------------------------------------------------------------
// Destination filter
// ---------------------------------------------------------------------------

/// URI prefixes of local faces that never receive reports.
pub const LOCAL_FACE_PREFIXES: [&str; 3] = ["internal://", "appFace://", "contentstore"];

/// Decides which outbound faces a report is delivered to.
///
/// ```
/// use tinyslru::report::DestinationFilter;
///
/// let filter = DestinationFilter::default();
/// let faces = ["udp4://10.0.0.1:6363", "internal://", "appFace://3", "tcp4://fog:6363"];
/// assert_eq!(filter.select(faces), vec!["udp4://10.0.0.1:6363", "tcp4://fog:6363"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationFilter {
    excluded: Vec<String>,
}

impl DestinationFilter {
    /// A filter that excludes nothing.
    pub fn allow_all() -> Self {
        Self {
            excluded: Vec::new(),
        }
    }

    /// Adds another excluded URI prefix.
    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.excluded.push(prefix.into());
        self
    }

    /// True if `uri` names a face that must not receive reports.
    pub fn is_excluded(&self, uri: &str) -> bool {
        self.excluded.iter().any(|p| uri.starts_with(p.as_str()))
    }

    /// The subset of `uris` that should receive a report, in input order.
    pub fn select<'a, I>(&self, uris: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        uris.into_iter().filter(|uri| !self.is_excluded(uri)).collect()
    }
}

impl Default for DestinationFilter {
    fn default() -> Self {
        LOCAL_FACE_PREFIXES
            .iter()
            .fold(Self::allow_all(), |filter, prefix| filter.exclude(*prefix))
    }
}
