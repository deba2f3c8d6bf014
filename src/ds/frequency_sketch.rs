//! Count-min frequency sketch.
//!
//! Fixed-memory approximate counter used by the admission policy to compare
//! the popularity of an incoming key against the eviction victim. Memory is
//! exactly `depth × width` counters no matter how many distinct keys are seen.
//!
//! ## Architecture
//!
//! ```text
//!   key ──FxHasher──► base
//!                      │
//!        ┌─────────────┼─────────────┬─────────────┐
//!        ▼             ▼             ▼             ▼
//!   mix(base,s0)  mix(base,s1)  mix(base,s2)  mix(base,s3)     seeds: (i+1)·0x9E3779B9
//!        │ % width     │ % width     │ % width     │ % width
//!        ▼             ▼             ▼             ▼
//!   row 0 [..][+1][..]  row 1 [+1][..][..]  ...              u32 counters, wrapping
//!
//!   estimate(key) = min over rows of the probed counter
//! ```
//!
//! ## Guarantees
//!
//! - `estimate(k)` is never below the number of `increment(k)` calls, unless a
//!   probed counter has wrapped past `u32::MAX`.
//! - Collisions can only over-count.
//! - There is no decay: estimates only grow, so a long-running sketch favors
//!   historically popular keys over recently popular ones.
//!
//! ## Example Usage
//!
//! ```
//! use tinyslru::ds::FrequencySketch;
//!
//! let mut sketch = FrequencySketch::new(4, 2048);
//! sketch.increment("/video/a");
//! sketch.increment("/video/a");
//! sketch.increment("/video/b");
//!
//! assert!(sketch.estimate("/video/a") >= 2);
//! assert!(sketch.estimate("/video/b") >= 1);
//! assert_eq!(sketch.counter_count(), 4 * 2048);
//! ```

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::ConfigError;

/// Odd 32-bit constant (fractional part of the golden ratio) used to derive row seeds.
pub const SEED_STEP: u32 = 0x9E37_79B9;

/// 64-bit multiplier for the per-row mix.
const MIX_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Count-min sketch over `u32` counters.
#[derive(Clone)]
pub struct FrequencySketch {
    depth: usize,
    width: usize,
    /// Row-major `depth × width` counters.
    table: Vec<u32>,
    seeds: Vec<u32>,
}

impl FrequencySketch {
    /// Creates a zeroed `depth × width` sketch.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero. See [`try_new`](Self::try_new).
    pub fn new(depth: usize, width: usize) -> Self {
        match Self::try_new(depth, width) {
            Ok(sketch) => sketch,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a zeroed sketch, returning an error on invalid dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `depth` or `width` is zero, or if the
    /// counter matrix size overflows `usize`.
    pub fn try_new(depth: usize, width: usize) -> Result<Self, ConfigError> {
        if depth == 0 {
            return Err(ConfigError::new("sketch depth must be greater than zero"));
        }
        if width == 0 {
            return Err(ConfigError::new("sketch width must be greater than zero"));
        }
        let cells = depth.checked_mul(width).ok_or_else(|| {
            ConfigError::new(format!("sketch dimensions {}x{} overflow", depth, width))
        })?;

        let seeds = (0..depth)
            .map(|i| ((i as u32).wrapping_add(1)).wrapping_mul(SEED_STEP) | 1)
            .collect();

        Ok(Self {
            depth,
            width,
            table: vec![0; cells],
            seeds,
        })
    }

    /// Records one occurrence of `key`.
    pub fn increment<K: Hash + ?Sized>(&mut self, key: &K) {
        let base = base_hash(key);
        for row in 0..self.depth {
            let cell = self.cell(base, row);
            self.table[cell] = self.table[cell].wrapping_add(1);
        }
    }

    /// Returns the minimum counter across all rows probed for `key`.
    pub fn estimate<K: Hash + ?Sized>(&self, key: &K) -> u32 {
        let base = base_hash(key);
        (0..self.depth)
            .map(|row| self.table[self.cell(base, row)])
            .min()
            .unwrap_or(0)
    }

    /// Number of hash rows.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Counters per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of counters held; fixed for the sketch's lifetime.
    #[inline]
    pub fn counter_count(&self) -> usize {
        self.table.len()
    }

    /// Row seeds, one per row, all odd and distinct for depth < 2^31.
    #[inline]
    pub fn seeds(&self) -> &[u32] {
        &self.seeds
    }

    /// Flat index of the counter probed for `base` in `row`.
    #[inline]
    fn cell(&self, base: u64, row: usize) -> usize {
        let mut h = (base ^ u64::from(self.seeds[row])).wrapping_mul(MIX_MULTIPLIER);
        h ^= h >> 32;
        row * self.width + (h % self.width as u64) as usize
    }

    #[cfg(test)]
    fn force_counter(&mut self, row: usize, col: usize, value: u32) {
        self.table[row * self.width + col] = value;
    }
}

#[inline]
fn base_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Debug for FrequencySketch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencySketch")
            .field("depth", &self.depth)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}
