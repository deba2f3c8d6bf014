//! Per-key request accounting with delta reporting.
//!
//! Each key carries a cumulative `total` and the `last_reported` value that
//! was included in a report. Both only grow. Draining returns the keys whose
//! totals moved since the previous drain and marks them reported.
//!
//! ```
//! use tinyslru::accountant::AccessAccountant;
//!
//! let mut acct = AccessAccountant::new();
//! acct.record(&"/a");
//! acct.record(&"/a");
//! acct.record(&"/b");
//! assert_eq!(acct.drain_deltas(), vec![("/a", 2), ("/b", 1)]);
//! assert!(acct.drain_deltas().is_empty());
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Cumulative and last-reported count for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessCounter {
    pub total: u64,
    pub last_reported: u64,
}

impl AccessCounter {
    /// Requests seen since the last report.
    #[inline]
    pub fn unreported(&self) -> u64 {
        self.total - self.last_reported
    }
}

#[derive(Debug, Clone)]
pub struct AccessAccountant<K> {
    counters: FxHashMap<K, AccessCounter>,
}

impl<K> AccessAccountant<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self {
            counters: FxHashMap::default(),
        }
    }

    /// Counts one request for `key`.
    pub fn record(&mut self, key: &K) {
        match self.counters.get_mut(key) {
            Some(counter) => counter.total = counter.total.saturating_add(1),
            None => {
                self.counters.insert(
                    key.clone(),
                    AccessCounter {
                        total: 1,
                        last_reported: 0,
                    },
                );
            },
        }
    }

    /// Cumulative count for `key`; zero if never seen.
    pub fn total(&self, key: &K) -> u64 {
        self.counters.get(key).map_or(0, |c| c.total)
    }

    /// Requests for `key` not yet covered by a report.
    pub fn unreported(&self, key: &K) -> u64 {
        self.counters.get(key).map_or(0, AccessCounter::unreported)
    }

    pub fn counter(&self, key: &K) -> Option<AccessCounter> {
        self.counters.get(key).copied()
    }

    /// Number of keys with a non-zero unreported delta.
    pub fn pending(&self) -> usize {
        self.counters.values().filter(|c| c.unreported() > 0).count()
    }

    /// Number of distinct keys ever recorded.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    /// Returns `(key, delta)` for every key with unreported requests, in
    /// ascending key order, and marks those deltas reported.
    pub fn drain_deltas(&mut self) -> Vec<(K, u64)> {
        let mut deltas: Vec<(K, u64)> = self
            .counters
            .iter_mut()
            .filter_map(|(key, counter)| {
                let delta = counter.unreported();
                if delta == 0 {
                    return None;
                }
                counter.last_reported = counter.total;
                Some((key.clone(), delta))
            })
            .collect();
        deltas.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        deltas
    }
}

impl<K> Default for AccessAccountant<K>
where
    K: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
