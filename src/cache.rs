//! Thread-safe memoization of pure functions
//!
//! Genome-wide scans test millions of sites, many of them sharing the same
//! genotype counts (especially rare variants). [`HweCache`] remembers every
//! exact p-value, every point probability of the null distribution and
//! every factorial range product that was ever calculated, so that
//! identical work is done only once per cache.
//!
//! The cache is an explicit object. Create it once and share it, e.g. as
//! `Arc<HweCache>`, between all tests and threads.
//!
//! ```
//! use std::sync::Arc;
//! use hwe::{Exact, Fast, GenotypeCounts, HweCache, HweTest};
//!
//! let cache = Arc::new(HweCache::new());
//! let exact = Exact::new(Arc::clone(&cache));
//! let fast = Fast::with_cache(Arc::clone(&cache));
//!
//! let counts = GenotypeCounts::new(500, 0, 2);
//! let p1 = exact.pvalue(&counts).unwrap();
//! let p2 = fast.pvalue(&counts).unwrap();
//! assert_eq!(p1.to_bits(), p2.to_bits());
//!
//! // the second call was a cache hit
//! assert_eq!(cache.exact_stats().misses, 1);
//! assert_eq!(cache.exact_stats().hits, 1);
//! ```
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use num_bigint::BigUint;

use crate::GenotypeCounts;

/// Hit and miss counters of a [`Memo`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoStats {
    /// Number of distinct keys in the memo
    pub entries: usize,
    /// Number of lookups that returned a previously calculated value
    pub hits: u64,
    /// Number of lookups that calculated the value
    pub misses: u64,
}

/// A concurrent, insert-only memo table for a pure function
///
/// Every key is calculated at most once. Concurrent callers asking for a key
/// that is currently being calculated block until the value is ready and then
/// receive the very same value.
///
/// The map is sharded, and the calculation itself runs outside of the shard
/// locks, so a slow calculation only blocks callers of the same key.
///
/// # Examples
///
/// ```
/// use hwe::cache::Memo;
///
/// let memo: Memo<u64, u64> = Memo::new();
/// assert_eq!(memo.get_or_compute(12, || 12 * 12), 144);
///
/// // the closure is not called again
/// assert_eq!(memo.get_or_compute(12, || unreachable!()), 144);
/// assert_eq!(memo.stats().misses, 1);
/// assert_eq!(memo.stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct Memo<K: Eq + Hash, V> {
    cells: DashMap<K, Arc<OnceLock<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Eq + Hash, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    /// Constructs a new, empty `Memo`
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, calculating it with `compute` on the first call
    pub fn get_or_compute<F: FnOnce() -> V>(&self, key: K, compute: F) -> V {
        let existing = self.cells.get(&key).map(|cell| Arc::clone(cell.value()));
        // the shard lock is released at the end of each statement,
        // `compute` never runs while it is held
        let cell = existing
            .unwrap_or_else(|| Arc::clone(self.cells.entry(key).or_default().value()));

        let mut computed = false;
        let value = cell.get_or_init(|| {
            computed = true;
            compute()
        });

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value.clone()
    }

    /// Returns the value for `key`, if it was calculated already
    ///
    /// Does not count as hit or miss.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cells
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Returns the number of keys in the memo
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if nothing was calculated yet
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns hit and miss counters
    pub fn stats(&self) -> MemoStats {
        MemoStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// The memo tables shared by all HWE tests
///
/// - exact p-values, keyed by canonical [`GenotypeCounts`]
/// - approximate (chi-square) p-values, keyed by canonical [`GenotypeCounts`]
/// - point probabilities of the exact null distribution, keyed by canonical [`GenotypeCounts`]
/// - products of integer ranges `lo * (lo + 1) * ... * hi`, keyed by `(lo, hi)`
///
/// Entries are never evicted. The key space of a cohort is bounded by its
/// sample size, so the cache lives as long as the scan.
/// The factorial table holds `AA!`, `Aa!` and `aa!` for every configuration
/// visited by the exact test, each entry about `N * log2(N)` bits. For
/// cohorts of 10^5 to 10^6 samples that is megabytes per entry, so use one
/// cache per cohort and drop it afterwards.
#[derive(Debug, Default)]
pub struct HweCache {
    exact: Memo<GenotypeCounts, f64>,
    approximate: Memo<GenotypeCounts, f64>,
    probabilities: Memo<GenotypeCounts, f64>,
    factorials: Memo<(u64, u64), Arc<BigUint>>,
}

impl HweCache {
    /// Constructs a new, empty cache
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn exact(&self) -> &Memo<GenotypeCounts, f64> {
        &self.exact
    }

    pub(crate) fn approximate(&self) -> &Memo<GenotypeCounts, f64> {
        &self.approximate
    }

    pub(crate) fn probabilities(&self) -> &Memo<GenotypeCounts, f64> {
        &self.probabilities
    }

    pub(crate) fn factorials(&self) -> &Memo<(u64, u64), Arc<BigUint>> {
        &self.factorials
    }

    /// Hit and miss counters of the exact p-values
    pub fn exact_stats(&self) -> MemoStats {
        self.exact.stats()
    }

    /// Hit and miss counters of the approximate p-values
    pub fn approximate_stats(&self) -> MemoStats {
        self.approximate.stats()
    }

    /// Hit and miss counters of the point probabilities
    pub fn probability_stats(&self) -> MemoStats {
        self.probabilities.stats()
    }

    /// Hit and miss counters of the factorial range products
    pub fn factorial_stats(&self) -> MemoStats {
        self.factorials.stats()
    }
}
