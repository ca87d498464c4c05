//! Exact test for Hardy-Weinberg equilibrium
//!
//! Given the allele counts of a site, the number of heterozygotes follows a
//! discrete distribution under equilibrium. The probability of observing
//! exactly `Aa` heterozygotes among `N` individuals with `A` major and `a`
//! minor alleles is
//!
//! ```text
//!                 2^Aa * A! * a!
//! P(Aa) = ---------------------------------
//!         (N+1) * ... * (2N) * AA! * Aa! * aa!
//! ```
//!
//! The p-value is the total probability of all configurations with the same
//! allele counts that are at most as likely as the observed one
//! (Wigginton, Cutler & Abecasis, AJHG 2005).
//!
//! All factorials are calculated as arbitrary-precision integers and only the
//! final ratio is rounded to `f64`. Floating point factorial ratios lose all
//! precision for larger samples, where p-values go down to `1e-301` and below.
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use tracing::{debug, trace};

use crate::{GenotypeCounts, HweCache, HweResult, HweTest};

/// Below this many factors a range product is multiplied sequentially
const SEQUENTIAL_PRODUCT: u64 = 16;

/// The smallest positive (subnormal) `f64`
///
/// Probabilities at or below this value have underflowed and
/// end the walk along a tail.
const SMALLEST_POSITIVE: f64 = 4.940_656_458_412_465_4e-324;

/// The exact HWE test as [`HweTest`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hwe::{Exact, GenotypeCounts, HweCache, HweTest};
///
/// let exact = Exact::new(Arc::new(HweCache::new()));
///
/// let p = exact.pvalue(&GenotypeCounts::new(2, 1, 3)).unwrap();
/// assert!((p - 0.151_515_151_515).abs() < 1e-9);
///
/// // extreme deviations are still resolved
/// let p = exact.pvalue(&GenotypeCounts::new(500, 0, 500)).unwrap();
/// assert!(p > 0.0 && p < 1e-300);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Exact {
    cache: Arc<HweCache>,
}

impl Exact {
    /// Constructs a new exact test that memoizes into `cache`
    pub fn new(cache: Arc<HweCache>) -> Self {
        Self { cache }
    }

    /// Returns the cache of the test
    pub fn cache(&self) -> &Arc<HweCache> {
        &self.cache
    }

    /// Returns the probability to observe exactly these genotype counts,
    /// given their allele counts
    ///
    /// # Errors
    ///
    /// [`crate::HweError::NoSamples`] if all counts are zero
    pub fn probability(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        counts.validate()?;
        Ok(probability(&self.cache, counts))
    }
}

impl HweTest for Exact {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        counts.validate()?;
        Ok(exact(&self.cache, counts))
    }
}

/// Calculates the exact HWE p-value of the genotype counts
///
/// The result is memoized per canonical genotype counts.
/// For empty counts this returns `1.0`.
///
/// # Panics
///
/// The counts are not validated. Allele counts that overflow `u64` panic
/// in debug builds, [`Exact`] rejects them.
pub fn exact(cache: &HweCache, counts: &GenotypeCounts) -> f64 {
    let counts = counts.canonical();
    cache
        .exact()
        .get_or_compute(counts, || tail_probability(cache, counts))
}

/// Returns the probability of exactly these genotype counts,
/// given their allele counts
///
/// The result is memoized per canonical genotype counts.
pub fn probability(cache: &HweCache, counts: &GenotypeCounts) -> f64 {
    let counts = counts.canonical();
    cache
        .probabilities()
        .get_or_compute(counts, || point_probability(cache, &counts))
}

/// Sums the probabilities of all configurations that are at most as
/// likely as `observed`
///
/// `observed` must be canonical.
fn tail_probability(cache: &HweCache, observed: GenotypeCounts) -> f64 {
    debug!("Calculating exact HWE p-value for {}", observed);
    let base = probability(cache, &observed);
    let mut sum = base;

    // towards more heterozygotes
    let mut current = observed;
    while let Some(next) = more_hets(&current) {
        current = next;
        let p = probability(cache, &current);
        if p > base {
            continue;
        }
        if p <= SMALLEST_POSITIVE {
            trace!("Probability underflow at {}", current);
            break;
        }
        sum += p;
    }

    // towards fewer heterozygotes
    let mut current = observed;
    while let Some(next) = fewer_hets(&current) {
        current = next;
        let p = probability(cache, &current);
        if p > base {
            continue;
        }
        if p <= SMALLEST_POSITIVE {
            trace!("Probability underflow at {}", current);
            break;
        }
        sum += p;
    }

    // rounding of the summands can push the total over 1 by an ulp
    sum.min(1.0)
}

/// Trades one of each homozygote for two heterozygotes
fn more_hets(counts: &GenotypeCounts) -> Option<GenotypeCounts> {
    match (counts.hom_major(), counts.hom_minor()) {
        (hom_major, hom_minor) if hom_major > 0 && hom_minor > 0 => Some(GenotypeCounts::new(
            hom_major - 1,
            counts.het() + 2,
            hom_minor - 1,
        )),
        _ => None,
    }
}

/// Trades two heterozygotes for one of each homozygote
fn fewer_hets(counts: &GenotypeCounts) -> Option<GenotypeCounts> {
    if counts.het() < 2 {
        return None;
    }
    Some(GenotypeCounts::new(
        counts.hom_major() + 1,
        counts.het() - 2,
        counts.hom_minor() + 1,
    ))
}

fn point_probability(cache: &HweCache, counts: &GenotypeCounts) -> f64 {
    let n = counts.sample_size();
    let factorial = |x: u64| factorial_range(cache, 1, x);

    let mut numer = BigUint::one() << counts.het();
    numer *= &*factorial(counts.major_alleles());
    numer *= &*factorial(counts.minor_alleles());

    let mut denom = BigUint::clone(&factorial_range(cache, n + 1, 2 * n));
    denom *= &*factorial(counts.hom_major());
    denom *= &*factorial(counts.het());
    denom *= &*factorial(counts.hom_minor());

    // `new_raw` skips the gcd reduction, which is expensive for
    // numbers with thousands of digits and irrelevant for the rounding
    let ratio = BigRational::new_raw(BigInt::from(numer), BigInt::from(denom));
    let p = ratio.to_f64().unwrap_or(0.0);
    trace!("P({}) = {:e}", counts, p);
    p
}

/// Returns the memoized product `lo * (lo + 1) * ... * hi`
fn factorial_range(cache: &HweCache, lo: u64, hi: u64) -> Arc<BigUint> {
    cache.factorials().get_or_compute((lo, hi), || {
        Arc::new(adjacent_product(cache, lo, hi).unwrap_or_else(|| range_product(lo, hi)))
    })
}

/// Derives `lo * ... * hi` from a memoized range that differs by the last factor
///
/// Consecutive configurations of a walk need factorials of neighbouring
/// numbers, so this is usually a single multiplication or division.
fn adjacent_product(cache: &HweCache, lo: u64, hi: u64) -> Option<BigUint> {
    if hi > lo {
        if let Some(shorter) = cache.factorials().get(&(lo, hi - 1)) {
            return Some(&*shorter * hi);
        }
    }
    let longer = cache.factorials().get(&(lo, hi.checked_add(1)?))?;
    Some(&*longer / (hi + 1))
}

/// Calculates `lo * (lo + 1) * ... * hi` by binary splitting
///
/// Returns `1` for empty ranges (`lo > hi`).
fn range_product(lo: u64, hi: u64) -> BigUint {
    match hi.checked_sub(lo) {
        None => BigUint::one(),
        Some(span) if span < SEQUENTIAL_PRODUCT => {
            (lo..=hi).fold(BigUint::one(), |acc, factor| acc * factor)
        }
        Some(span) => {
            let mid = lo + span / 2;
            range_product(lo, mid) * range_product(mid + 1, hi)
        }
    }
}
