//! Segmented LRU (SLRU) store with fixed per-segment capacities.
//!
//! New keys enter the probation segment. A hit in probation promotes the entry
//! to the protected segment; if that overflows protected, its LRU entry is
//! demoted back to the head of probation. Eviction only ever happens on the
//! insert of a new key.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        SegmentedCache<K, V> Layout                          │
//! │                                                                             │
//! │   map: FxHashMap<K, SlotId>          arena: SlotArena<Node<K, V>>           │
//! │   ┌──────────┬──────────┐            ┌─────┬──────────────────────────┐     │
//! │   │  "/v/a"  │  id_0    │───────────►│  0  │ key, value, Protected    │     │
//! │   │  "/v/b"  │  id_1    │───────────►│  1  │ key, value, Probation    │     │
//! │   └──────────┴──────────┘            └─────┴──────────────────────────┘     │
//! │                                                                             │
//! │   PROBATION (cap P)                        PROTECTED (cap Q)                │
//! │   head(MRU) ◄──► ... ◄──► tail(LRU)        head(MRU) ◄──► ... ◄──► tail     │
//! │      ▲                       │                ▲                       │     │
//! │      │ insert (new key)      │ evict          │ promote on hit        │     │
//! │      └───────────────────────┼────────────────┘                       │     │
//! │      ▲                       ▼                                        │     │
//! │      └──────────────── demote when protected overflows ◄──────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - `probation_len() <= probation_capacity()` and
//!   `protected_len() <= protected_capacity()` after every operation.
//! - A key lives in exactly one segment.
//! - At most one entry is evicted per [`insert`](SegmentedCache::insert);
//!   [`fetch`](SegmentedCache::fetch) never evicts.
//!
//! ## Operations
//!
//! | Operation        | Time  | Notes                                        |
//! |------------------|-------|----------------------------------------------|
//! | `fetch`          | O(1)  | Promotes probation hits, may demote          |
//! | `insert`         | O(1)  | Returns the evicted entry, if any            |
//! | `select_victim`  | O(1)  | Side-effect free                             |
//! | `insert_victim`  | O(1)  | Victim an insert of this key would displace  |
//! | `contains`       | O(1)  | Index lookup only                            |
//!
//! ## Example Usage
//!
//! ```
//! use tinyslru::policy::slru::{Segment, SegmentedCache};
//!
//! let mut cache = SegmentedCache::new(2, 2);
//! cache.insert("/a", 1);
//! cache.insert("/b", 2);
//! assert_eq!(cache.segment_of(&"/a"), Some(Segment::Probation));
//!
//! // A hit promotes to protected.
//! assert_eq!(cache.fetch(&"/a"), Some(&1));
//! assert_eq!(cache.segment_of(&"/a"), Some(Segment::Protected));
//!
//! // Probation is [/b]; the next new key still fits.
//! assert_eq!(cache.insert("/c", 3), None);
//! // Probation is full now, so /b (its LRU) is next to go.
//! assert_eq!(cache.select_victim(), Some(&"/b"));
//! assert_eq!(cache.insert("/d", 4), Some(("/b", 2)));
//! ```

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{SlotArena, SlotId};
use crate::error::{ConfigError, InvariantError};
use crate::metrics::snapshot::SlruMetricsSnapshot;
use crate::metrics::stats::SlruMetrics;
use crate::metrics::traits::{CoreMetricsRecorder, SlruMetricsRecorder};
use crate::traits::{CoreCache, ReadOnlyCache, VictimSelection};

/// Which segment an entry currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Entry point for new keys; evicted first.
    Probation,
    /// Keys that were hit at least once while resident.
    Protected,
}

struct Node<K, V> {
    prev: Option<SlotId>,
    next: Option<SlotId>,
    segment: Segment,
    key: K,
    value: V,
}

/// Intrusive list bookkeeping for one segment.
#[derive(Debug, Clone, Copy)]
struct SegmentList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
    cap: usize,
}

impl SegmentList {
    fn with_capacity(cap: usize) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            cap,
        }
    }

    #[inline]
    fn overflows(&self) -> bool {
        self.len > self.cap
    }
}

/// Two-segment LRU store. See the [module docs](self).
pub struct SegmentedCache<K, V> {
    map: FxHashMap<K, SlotId>,
    arena: SlotArena<Node<K, V>>,
    probation: SegmentList,
    protected: SegmentList,
    metrics: SlruMetrics,
}

impl<K, V> SegmentedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates a cache with fixed segment capacities.
    ///
    /// # Panics
    ///
    /// Panics if `probation_cap` is zero. See [`try_new`](Self::try_new).
    pub fn new(probation_cap: usize, protected_cap: usize) -> Self {
        match Self::try_new(probation_cap, protected_cap) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a cache, returning an error on invalid capacities.
    ///
    /// `protected_cap` may be zero, in which case every promotion is
    /// immediately demoted and the store degrades to plain LRU.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the total capacity is zero, if
    /// `probation_cap` is zero, or if the total overflows `usize`.
    pub fn try_new(probation_cap: usize, protected_cap: usize) -> Result<Self, ConfigError> {
        let total = probation_cap.checked_add(protected_cap).ok_or_else(|| {
            ConfigError::new(format!(
                "segment capacities {} + {} overflow",
                probation_cap, protected_cap
            ))
        })?;
        if total == 0 {
            return Err(ConfigError::new("total capacity must be greater than zero"));
        }
        if probation_cap == 0 {
            return Err(ConfigError::new(
                "probation capacity must be greater than zero",
            ));
        }

        Ok(Self {
            map: FxHashMap::default(),
            arena: SlotArena::new(),
            probation: SegmentList::with_capacity(probation_cap),
            protected: SegmentList::with_capacity(protected_cap),
            metrics: SlruMetrics::default(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Combined capacity of both segments.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.probation.cap + self.protected.cap
    }

    /// True iff combined occupancy equals combined capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    #[inline]
    pub fn probation_len(&self) -> usize {
        self.probation.len
    }

    #[inline]
    pub fn protected_len(&self) -> usize {
        self.protected.len
    }

    #[inline]
    pub fn probation_capacity(&self) -> usize {
        self.probation.cap
    }

    #[inline]
    pub fn protected_capacity(&self) -> usize {
        self.protected.cap
    }

    /// Segment holding `key`, if resident.
    pub fn segment_of(&self, key: &K) -> Option<Segment> {
        self.map.get(key).map(|&id| self.arena[id].segment)
    }

    /// Reads a value without touching recency or segment.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&id| &self.arena[id].value)
    }

    /// Looks up `key`, promoting or refreshing it on a hit.
    ///
    /// A probation hit moves the entry to the protected MRU; if protected
    /// then exceeds its capacity, its LRU entry is demoted to the probation
    /// MRU. Nothing is ever evicted here.
    pub fn fetch(&mut self, key: &K) -> Option<&V> {
        let id = match self.map.get(key) {
            Some(&id) => id,
            None => {
                self.metrics.record_get_miss();
                return None;
            },
        };
        self.metrics.record_get_hit();
        self.touch(id);
        Some(&self.arena[id].value)
    }

    /// Stores `key → value` and returns the entry evicted to make room.
    ///
    /// An existing key has its value replaced and is treated as a hit; no
    /// eviction happens. A new key enters at the probation MRU, after which
    /// at most one entry is evicted to restore the segment capacities.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.metrics.record_insert_call();

        if let Some(&id) = self.map.get(&key) {
            self.metrics.record_insert_update();
            self.arena[id].value = value;
            self.touch(id);
            return None;
        }

        self.metrics.record_insert_new();
        let id = self.arena.insert(Node {
            prev: None,
            next: None,
            segment: Segment::Probation,
            key: key.clone(),
            value,
        });
        self.map.insert(key, id);
        self.attach_head(id, Segment::Probation);

        let evicted = self.enforce_capacity();

        debug_assert!(
            self.check_invariants().is_ok(),
            "{:?}",
            self.check_invariants()
        );
        evicted
    }

    /// The entry the replacement policy would evict next: the probation LRU
    /// if probation is non-empty, else the protected LRU.
    pub fn select_victim(&self) -> Option<&K> {
        self.probation
            .tail
            .or(self.protected.tail)
            .map(|id| &self.arena[id].key)
    }

    /// The entry an `insert(key, _)` would evict, or `None` if it fits.
    ///
    /// Equal to [`select_victim`](Self::select_victim) whenever the cache is
    /// full and `key` is absent.
    pub fn insert_victim(&self, key: &K) -> Option<&K> {
        if self.map.contains_key(key) || self.probation.len < self.probation.cap {
            return None;
        }
        self.probation.tail.map(|id| &self.arena[id].key)
    }

    /// Keys of one segment in MRU → LRU order.
    pub fn segment_keys(&self, segment: Segment) -> SegmentKeys<'_, K, V> {
        let list = self.list(segment);
        SegmentKeys {
            arena: &self.arena,
            current: list.head,
            remaining: list.len,
        }
    }

    pub fn metrics(&self) -> &SlruMetrics {
        &self.metrics
    }

    /// Copies counters and segment gauges.
    pub fn metrics_snapshot(&self) -> SlruMetricsSnapshot {
        SlruMetricsSnapshot::from_counters(
            &self.metrics,
            self.probation.len,
            self.protected.len,
            self.probation.cap,
            self.protected.cap,
        )
    }

    // -----------------------------------------------------------------------
    // Segment helpers
    // -----------------------------------------------------------------------

    #[inline]
    fn list(&self, segment: Segment) -> &SegmentList {
        match segment {
            Segment::Probation => &self.probation,
            Segment::Protected => &self.protected,
        }
    }

    #[inline]
    fn list_mut(&mut self, segment: Segment) -> &mut SegmentList {
        match segment {
            Segment::Probation => &mut self.probation,
            Segment::Protected => &mut self.protected,
        }
    }

    fn attach_head(&mut self, id: SlotId, segment: Segment) {
        let old_head = self.list(segment).head;
        {
            let node = &mut self.arena[id];
            node.prev = None;
            node.next = old_head;
            node.segment = segment;
        }
        match old_head {
            Some(h) => self.arena[h].prev = Some(id),
            None => self.list_mut(segment).tail = Some(id),
        }
        let list = self.list_mut(segment);
        list.head = Some(id);
        list.len += 1;
    }

    fn detach(&mut self, id: SlotId) {
        let (prev, next, segment) = {
            let node = &mut self.arena[id];
            let links = (node.prev, node.next, node.segment);
            node.prev = None;
            node.next = None;
            links
        };
        match prev {
            Some(p) => self.arena[p].next = next,
            None => self.list_mut(segment).head = next,
        }
        match next {
            Some(n) => self.arena[n].prev = prev,
            None => self.list_mut(segment).tail = prev,
        }
        self.list_mut(segment).len -= 1;
    }

    /// Hit handling: promote from probation, or move to protected MRU.
    fn touch(&mut self, id: SlotId) {
        match self.arena[id].segment {
            Segment::Probation => {
                self.detach(id);
                self.attach_head(id, Segment::Protected);
                self.metrics.record_probation_to_protected();

                if self.protected.overflows() {
                    if let Some(demoted) = self.protected.tail {
                        self.detach(demoted);
                        self.attach_head(demoted, Segment::Probation);
                        self.metrics.record_protected_demotion();
                    }
                }
            },
            Segment::Protected => {
                if self.protected.head != Some(id) {
                    self.detach(id);
                    self.attach_head(id, Segment::Protected);
                }
            },
        }
    }

    /// Evicts at most one entry to bring an overflowing segment back under
    /// its capacity.
    fn enforce_capacity(&mut self) -> Option<(K, V)> {
        let segment = if self.probation.overflows() {
            Segment::Probation
        } else if self.protected.overflows() {
            Segment::Protected
        } else {
            return None;
        };
        self.evict_tail(segment)
    }

    fn evict_tail(&mut self, segment: Segment) -> Option<(K, V)> {
        self.metrics.record_evict_call();
        let id = self.list(segment).tail?;
        self.detach(id);
        let node = self.arena.remove(id)?;
        self.map.remove(&node.key);
        self.metrics.record_evicted_entry();
        if segment == Segment::Protected {
            self.metrics.record_protected_eviction();
        }
        Some((node.key, node.value))
    }

    /// Walks both segments and cross-checks links, lengths, capacities and
    /// the key index.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut seen = 0usize;
        for segment in [Segment::Probation, Segment::Protected] {
            let list = self.list(segment);
            if list.len > list.cap {
                return Err(InvariantError::new(format!(
                    "{:?} holds {} entries, capacity {}",
                    segment, list.len, list.cap
                )));
            }

            let mut count = 0usize;
            let mut prev: Option<SlotId> = None;
            let mut current = list.head;
            while let Some(id) = current {
                count += 1;
                if count > list.len {
                    return Err(InvariantError::new(format!(
                        "{:?} list is longer than its recorded length {}",
                        segment, list.len
                    )));
                }
                let node = self.arena.get(id).ok_or_else(|| {
                    InvariantError::new(format!("{:?} list: stale slot {}", segment, id.index()))
                })?;
                if node.segment != segment {
                    return Err(InvariantError::new(format!(
                        "slot {} linked into {:?} but tagged {:?}",
                        id.index(),
                        segment,
                        node.segment
                    )));
                }
                if node.prev != prev {
                    return Err(InvariantError::new(format!(
                        "{:?} list: slot {} prev link inconsistent",
                        segment,
                        id.index()
                    )));
                }
                if self.map.get(&node.key) != Some(&id) {
                    return Err(InvariantError::new(format!(
                        "slot {} is not indexed under its key",
                        id.index()
                    )));
                }
                prev = Some(id);
                current = node.next;
            }
            if count != list.len {
                return Err(InvariantError::new(format!(
                    "{:?} list: counted {} but len = {}",
                    segment, count, list.len
                )));
            }
            if list.tail != prev {
                return Err(InvariantError::new(format!(
                    "{:?} list: tail does not match last node",
                    segment
                )));
            }
            seen += count;
        }

        if seen != self.map.len() || seen != self.arena.len() {
            return Err(InvariantError::new(format!(
                "segments hold {} entries, index {}, arena {}",
                seen,
                self.map.len(),
                self.arena.len()
            )));
        }
        Ok(())
    }
}

/// Iterator over one segment's keys, MRU first.
pub struct SegmentKeys<'a, K, V> {
    arena: &'a SlotArena<Node<K, V>>,
    current: Option<SlotId>,
    remaining: usize,
}

impl<'a, K, V> Iterator for SegmentKeys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.arena.get(id)?;
        self.current = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(&node.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for SegmentKeys<'_, K, V> {}

impl<K, V> std::iter::FusedIterator for SegmentKeys<'_, K, V> {}

impl<K, V> fmt::Debug for SegmentedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedCache")
            .field("len", &self.map.len())
            .field("probation_len", &self.probation.len)
            .field("probation_cap", &self.probation.cap)
            .field("protected_len", &self.protected.len)
            .field("protected_cap", &self.protected.cap)
            .finish_non_exhaustive()
    }
}

impl<K, V> ReadOnlyCache<K, V> for SegmentedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    #[inline]
    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    fn capacity(&self) -> usize {
        SegmentedCache::capacity(self)
    }
}

impl<K, V> CoreCache<K, V> for SegmentedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&id) = self.map.get(&key) {
            self.metrics.record_insert_call();
            self.metrics.record_insert_update();
            let old = std::mem::replace(&mut self.arena[id].value, value);
            self.touch(id);
            return Some(old);
        }
        SegmentedCache::insert(self, key, value);
        None
    }

    #[inline]
    fn get(&mut self, key: &K) -> Option<&V> {
        self.fetch(key)
    }
}

impl<K, V> VictimSelection<K, V> for SegmentedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    #[inline]
    fn select_victim(&self) -> Option<&K> {
        SegmentedCache::select_victim(self)
    }

    #[inline]
    fn insert_victim(&self, key: &K) -> Option<&K> {
        SegmentedCache::insert_victim(self, key)
    }

    #[inline]
    fn is_full(&self) -> bool {
        SegmentedCache::is_full(self)
    }
}
