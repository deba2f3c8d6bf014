//! # Cache Trait Hierarchy
//!
//! Narrow traits at the seams between the store, the admission policy and
//! the request/response pipeline.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────┐
//!   │       ReadOnlyCache<K, V>       │   contains / len / is_empty / capacity
//!   └────────────────┬────────────────┘
//!                    ▼
//!   ┌─────────────────────────────────┐
//!   │         CoreCache<K, V>         │   insert → previous value, get
//!   └────────────────┬────────────────┘
//!                    ▼
//!   ┌─────────────────────────────────┐
//!   │      VictimSelection<K, V>      │   select_victim / insert_victim / is_full
//!   └─────────────────────────────────┘
//!                    ▲  consulted by AdmissionPolicy
//!
//!   ┌─────────────────────────────────┐
//!   │        CacheStrategy<V>         │   on_request / on_response_arrival / flush
//!   └─────────────────────────────────┘
//!                    ▲  driven by the request/response pipeline
//! ```
//!
//! | Trait             | Extends         | Implemented by                     |
//! |-------------------|-----------------|------------------------------------|
//! | `ReadOnlyCache`   | -               | `SegmentedCache`                   |
//! | `CoreCache`       | `ReadOnlyCache` | `SegmentedCache`                   |
//! | `VictimSelection` | `CoreCache`     | `SegmentedCache`                   |
//! | `CacheStrategy`   | -               | `Engine`                           |
//! | `ConcurrentCache` | `Send + Sync`   | `ConcurrentEngine`                 |

use crate::name::Name;
use crate::policy::admission::AdmissionOutcome;
use crate::report::AccessReport;

/// Side-effect free queries.
pub trait ReadOnlyCache<K, V> {
    /// Checks if a key exists without updating recency.
    fn contains(&self, key: &K) -> bool;

    /// Current number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries the cache can hold.
    fn capacity(&self) -> usize;
}

/// Insert and lookup through a unified interface.
///
/// # Example
///
/// ```
/// use tinyslru::policy::slru::SegmentedCache;
/// use tinyslru::traits::{CoreCache, ReadOnlyCache};
///
/// let mut cache = SegmentedCache::new(2, 2);
/// assert_eq!(CoreCache::insert(&mut cache, "a", 1), None);
/// assert_eq!(CoreCache::insert(&mut cache, "a", 2), Some(1));
/// assert_eq!(cache.get(&"a"), Some(&2));
/// assert_eq!(cache.len(), 1);
/// ```
pub trait CoreCache<K, V>: ReadOnlyCache<K, V> {
    /// Inserts a key-value pair, returning the previous value if it existed.
    ///
    /// May evict according to the cache's replacement policy.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    /// Gets a reference to a value by key, updating recency.
    fn get(&mut self, key: &K) -> Option<&V>;
}

/// Exposes the replacement decision so an admission filter can compare
/// the incoming key against the entry it would displace.
pub trait VictimSelection<K, V>: CoreCache<K, V> {
    /// The entry the replacement policy would evict next, or `None` when
    /// the cache is empty.
    fn select_victim(&self) -> Option<&K>;

    /// The entry that inserting `key` would evict, or `None` when the
    /// insert fits (including when `key` is already present).
    fn insert_victim(&self, key: &K) -> Option<&K>;

    /// True iff occupancy equals capacity.
    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

/// Hooks a request/response pipeline calls on its cache.
///
/// The pipeline calls `on_request` before dispatching upstream and
/// `on_response_arrival` once per satisfied request. `flush` is called by
/// the report timer.
pub trait CacheStrategy<V> {
    /// Looks the key up; `Some` means the request is served locally.
    fn on_request(&mut self, key: &Name) -> Option<&V>;

    /// Offers a fetched value to the admission policy.
    fn on_response_arrival(&mut self, key: Name, value: V) -> AdmissionOutcome;

    /// Drains unreported access deltas into a report, or `None` if there
    /// is nothing to report.
    fn flush(&mut self) -> Option<AccessReport>;
}

/// Marker for strategies that can be shared across threads.
pub trait ConcurrentCache: Send + Sync {}
