//! TinyLFU-style admission in front of the segmented store.
//!
//! Every fetched response passes two gates before it may be cached:
//!
//! ```text
//!   response(key) ──► sketch.increment(key)
//!                         │
//!                         ▼
//!               u ~ U[0,1) from seeded rng
//!               u < θ(key) ? ──── no ───► Rejected(Theta)
//!                         │ yes
//!                         ▼
//!               cache full (and key absent)? ── no ──► insert, Admitted
//!                         │ yes
//!                         ▼
//!               victim = cache.select_victim()
//!               tie_break.admits(est(victim), est(key)) ?
//!                 yes ──► insert (victim evicted), Admitted { evicted: Some(victim) }
//!                 no  ──► Rejected(Frequency)
//! ```
//!
//! Only the θ gate applies while the cache has free capacity. An insert into a
//! full probation segment still evicts its LRU entry in that case, keeping
//! both segments within their caps.

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::ds::FrequencySketch;
use crate::error::ConfigError;
use crate::name::Name;
use crate::policy::slru::SegmentedCache;
use crate::traits::VictimSelection;

/// Admission probability for keys without an explicit entry.
pub const DEFAULT_THETA: f64 = 0.5;

/// Clamps a probability into `[0.0, 1.0]`; NaN maps to `0.0`.
#[inline]
pub fn clamp_theta(theta: f64) -> f64 {
    if theta.is_nan() {
        0.0
    } else {
        theta.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// ThetaTable
// ---------------------------------------------------------------------------

/// Per-key admission probabilities written by the external controller.
///
/// Entries have no TTL and are never removed; absent keys resolve to the
/// default θ.
///
/// ```
/// use tinyslru::policy::admission::ThetaTable;
/// use tinyslru::Name;
///
/// let mut table = ThetaTable::new(0.5);
/// table.set(Name::from("/hot"), 1.7);
/// assert_eq!(table.theta_for(&Name::from("/hot")), 1.0);
/// assert_eq!(table.theta_for(&Name::from("/cold")), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct ThetaTable {
    entries: FxHashMap<Name, f64>,
    default_theta: f64,
}

impl ThetaTable {
    /// # Panics
    ///
    /// Panics if `default_theta` is outside `[0.0, 1.0]`.
    pub fn new(default_theta: f64) -> Self {
        match Self::try_new(default_theta) {
            Ok(table) => table,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates an empty table, rejecting a default outside `[0.0, 1.0]`.
    pub fn try_new(default_theta: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&default_theta) {
            return Err(ConfigError::new(format!(
                "default theta must be within [0, 1], got {}",
                default_theta
            )));
        }
        Ok(Self {
            entries: FxHashMap::default(),
            default_theta,
        })
    }

    /// θ for `key`, or the default if the controller never set one.
    #[inline]
    pub fn theta_for(&self, key: &Name) -> f64 {
        self.entries.get(key).copied().unwrap_or(self.default_theta)
    }

    /// Stores a clamped θ for `key`, returning the previous explicit value.
    pub fn set(&mut self, key: Name, theta: f64) -> Option<f64> {
        self.entries.insert(key, clamp_theta(theta))
    }

    /// Applies a decoded batch, returning the number of entries written.
    pub fn apply<I>(&mut self, updates: I) -> usize
    where
        I: IntoIterator<Item = (Name, f64)>,
    {
        let mut applied = 0;
        for (key, theta) in updates {
            let theta = clamp_theta(theta);
            debug!(key = %key, theta, "theta updated");
            self.entries.insert(key, theta);
            applied += 1;
        }
        applied
    }

    #[inline]
    pub fn default_theta(&self) -> f64 {
        self.default_theta
    }

    /// Number of keys with an explicit θ.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ThetaTable {
    fn default() -> Self {
        Self::new(DEFAULT_THETA)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How equal frequency estimates between candidate and victim are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Admit only if `est(victim) < est(candidate)`.
    #[default]
    RejectOnTie,
    /// Admit if `est(victim) <= est(candidate)`.
    AdmitOnTie,
}

impl TieBreak {
    /// Whether a candidate with `candidate` hits may displace a victim with
    /// `victim` hits.
    #[inline]
    pub fn admits(self, victim: u32, candidate: u32) -> bool {
        match self {
            TieBreak::RejectOnTie => victim < candidate,
            TieBreak::AdmitOnTie => victim <= candidate,
        }
    }
}

/// Why a response was not cached.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The random draw `sample` was not below the key's `theta`.
    Theta { theta: f64, sample: f64 },
    /// The victim is at least as popular as the candidate.
    Frequency {
        victim: Name,
        victim_estimate: u32,
        candidate_estimate: u32,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Theta { theta, sample } => {
                write!(f, "theta gate: sample {:.4} >= theta {:.4}", sample, theta)
            },
            Rejection::Frequency {
                victim,
                victim_estimate,
                candidate_estimate,
            } => write!(
                f,
                "frequency gate: victim {} ({}) outranks candidate ({})",
                victim, victim_estimate, candidate_estimate
            ),
        }
    }
}

/// Result of offering one response to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    /// The key was inserted; `evicted` names the displaced entry, if any.
    Admitted { evicted: Option<Name> },
    /// The key was already resident; its value was replaced and it was
    /// treated as a hit.
    Refreshed,
    Rejected(Rejection),
    /// The response carried a control payload and bypassed the cache.
    ControlMessage,
}

impl AdmissionOutcome {
    /// True if the key is resident after the call.
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            AdmissionOutcome::Admitted { .. } | AdmissionOutcome::Refreshed
        )
    }

    /// The evicted key, if this admission displaced one.
    pub fn evicted(&self) -> Option<&Name> {
        match self {
            AdmissionOutcome::Admitted { evicted } => evicted.as_ref(),
            _ => None,
        }
    }
}

impl From<Rejection> for AdmissionOutcome {
    fn from(rejection: Rejection) -> Self {
        AdmissionOutcome::Rejected(rejection)
    }
}

// ---------------------------------------------------------------------------
// AdmissionPolicy
// ---------------------------------------------------------------------------

/// Owns the sketch, the θ table and the random source for one engine.
pub struct AdmissionPolicy {
    sketch: FrequencySketch,
    thetas: ThetaTable,
    tie_break: TieBreak,
    rng: SmallRng,
}

impl AdmissionPolicy {
    pub fn new(sketch: FrequencySketch, thetas: ThetaTable, tie_break: TieBreak, seed: u64) -> Self {
        Self {
            sketch,
            thetas,
            tie_break,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Runs both gates for `key` against the current state of `cache`.
    ///
    /// Draws exactly one random sample per call. The sketch is not touched;
    /// callers record the response with [`record`](Self::record) first.
    pub fn evaluate<C, V>(&mut self, cache: &C, key: &Name) -> Result<(), Rejection>
    where
        C: VictimSelection<Name, V>,
    {
        let theta = self.thetas.theta_for(key);
        let sample: f64 = self.rng.random();
        if sample >= theta {
            return Err(Rejection::Theta { theta, sample });
        }

        if cache.contains(key) || !cache.is_full() {
            return Ok(());
        }
        let Some(victim) = cache.select_victim() else {
            return Ok(());
        };
        let candidate_estimate = self.sketch.estimate(key);
        let victim_estimate = self.sketch.estimate(victim);
        debug!(
            candidate = %key,
            candidate_estimate,
            victim = %victim,
            victim_estimate,
            tie_break = ?self.tie_break,
            "frequency comparison"
        );

        if self.tie_break.admits(victim_estimate, candidate_estimate) {
            Ok(())
        } else {
            Err(Rejection::Frequency {
                victim: victim.clone(),
                victim_estimate,
                candidate_estimate,
            })
        }
    }

    /// Counts one response for `key` in the sketch.
    #[inline]
    pub fn record(&mut self, key: &Name) {
        self.sketch.increment(key);
        trace!(key = %key, estimate = self.sketch.estimate(key), "sketch incremented");
    }

    /// Records the response, runs both gates and mutates `cache` accordingly.
    pub fn offer<V>(
        &mut self,
        cache: &mut SegmentedCache<Name, V>,
        key: Name,
        value: V,
    ) -> AdmissionOutcome {
        self.record(&key);

        if let Err(rejection) = self.evaluate::<_, V>(&*cache, &key) {
            debug!(key = %key, reason = %rejection, "admission rejected");
            return rejection.into();
        }

        if cache.contains(&key) {
            cache.insert(key, value);
            return AdmissionOutcome::Refreshed;
        }

        let evicted = cache.insert(key.clone(), value).map(|(victim, _)| victim);
        match &evicted {
            Some(victim) => debug!(key = %key, evicted = %victim, "admitted with eviction"),
            None => debug!(key = %key, "admitted"),
        }
        AdmissionOutcome::Admitted { evicted }
    }

    /// Current estimate for `key`.
    #[inline]
    pub fn estimate(&self, key: &Name) -> u32 {
        self.sketch.estimate(key)
    }

    pub fn sketch(&self) -> &FrequencySketch {
        &self.sketch
    }

    pub fn thetas(&self) -> &ThetaTable {
        &self.thetas
    }

    pub fn thetas_mut(&mut self) -> &mut ThetaTable {
        &mut self.thetas
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }
}

impl fmt::Debug for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPolicy")
            .field("sketch", &self.sketch)
            .field("theta_entries", &self.thetas.len())
            .field("tie_break", &self.tie_break)
            .finish_non_exhaustive()
    }
}
