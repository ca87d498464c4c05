//! Asymptotic chi-square test for Hardy-Weinberg equilibrium
//!
//! The observed genotype counts are compared to the counts expected
//! under equilibrium, given the observed allele frequencies `p` and `q`:
//!
//! ```text
//! E(AA) = N * p^2
//! E(Aa) = N * 2pq
//! E(aa) = N * q^2
//! ```
//!
//! The sum of `(observed - expected)^2 / expected` follows a chi-square
//! distribution with one degree of freedom. The approximation is cheap,
//! but inaccurate for small samples and rare alleles. Use [`crate::Exact`]
//! for those, or [`crate::Fast`] to combine both.
use std::sync::Arc;

use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::warn;

use crate::genotype::f64_from_u64;
use crate::{GenotypeCounts, HweCache, HweError, HweResult, HweTest};

/// Calculates the chi-square statistic of the genotype counts
///
/// Monomorphic sites have a statistic of `0.0`: the whole population
/// carries the same allele, which is exactly what equilibrium expects.
/// This includes empty counts.
///
/// # Examples
///
/// ```
/// use hwe::GenotypeCounts;
/// use hwe::chisquare::statistic;
///
/// assert!((statistic(&GenotypeCounts::new(83, 13, 4)) - 9.506_534).abs() < 1e-6);
/// assert_eq!(statistic(&GenotypeCounts::new(500, 0, 0)), 0.0);
/// ```
pub fn statistic(counts: &GenotypeCounts) -> f64 {
    if counts.is_monomorphic() {
        return 0.0;
    }

    let n = f64_from_u64(counts.sample_size());
    let alleles = f64_from_u64(counts.allele_count());

    // allele frequencies are based on the number of observed alleles,
    // not on the number of individuals carrying them
    let p = f64_from_u64(counts.major_alleles()) / alleles;
    let q = f64_from_u64(counts.minor_alleles()) / alleles;

    let expected = [p * p * n, 2.0 * p * q * n, q * q * n];
    let observed = [
        f64_from_u64(counts.hom_major()),
        f64_from_u64(counts.het()),
        f64_from_u64(counts.hom_minor()),
    ];

    observed
        .iter()
        .zip(expected.iter())
        .map(|(obs, exp)| (exp - obs).powi(2) / exp)
        .sum()
}

/// Returns the probability to observe a chi-square value (1 degree of freedom)
/// of at least `statistic`
///
/// # Errors
///
/// [`HweError::Distribution`] if the statistic is not a valid chi-square
/// value, or if the distribution can not be evaluated.
///
/// # Examples
///
/// ```
/// use hwe::chisquare::survival;
///
/// assert_eq!(survival(0.0).unwrap(), 1.0);
/// assert!((survival(3.841_459).unwrap() - 0.05).abs() < 1e-6);
/// assert!(survival(f64::NAN).is_err());
/// ```
pub fn survival(statistic: f64) -> HweResult<f64> {
    if statistic.is_nan() || statistic < 0.0 {
        return Err(HweError::Distribution(format!(
            "invalid chi-square statistic {statistic}"
        )));
    }
    if statistic.is_infinite() {
        return Ok(0.0);
    }
    let dist = ChiSquared::new(1.0)?;
    let pvalue = 1.0 - dist.cdf(statistic);
    if (0.0..=1.0).contains(&pvalue) {
        Ok(pvalue)
    } else {
        Err(HweError::Distribution(format!(
            "p-value {pvalue} out of range for chi-square statistic {statistic}"
        )))
    }
}

/// Calculates the approximate HWE p-value of the genotype counts
///
/// If the chi-square distribution can not be evaluated, `0.0` is returned.
/// Callers thus treat a numerical failure like a significant deviation
/// from equilibrium. This keeps compatibility with existing scans but mixes
/// up "computation failed" and "reject". Use [`statistic`] and [`survival`]
/// directly to handle the failure yourself.
///
/// Empty counts are monomorphic and return `1.0`. Use [`ChiSquare`] to
/// reject them instead.
///
/// # Panics
///
/// The counts are not validated. Allele counts that overflow `u64` panic
/// in debug builds, [`ChiSquare`] rejects them.
///
/// # Examples
///
/// ```
/// use hwe::GenotypeCounts;
/// use hwe::chisquare::approximate;
///
/// let p = approximate(&GenotypeCounts::new(50, 57, 14));
/// assert!((p - 0.711_307).abs() < 1e-6);
///
/// // monomorphic sites are always in equilibrium
/// assert_eq!(approximate(&GenotypeCounts::new(500, 0, 0)), 1.0);
/// ```
pub fn approximate(counts: &GenotypeCounts) -> f64 {
    // the canonical order guarantees bit-identical results for
    // counts that only differ in which homozygote is called major
    let counts = counts.canonical();
    pvalue_or_reject(survival(statistic(&counts)), &counts)
}

/// Turns a failed evaluation into `0.0`, i.e. into a rejection of equilibrium
fn pvalue_or_reject(result: HweResult<f64>, counts: &GenotypeCounts) -> f64 {
    match result {
        Ok(pvalue) => pvalue,
        Err(err) => {
            warn!("Chi-square evaluation failed for {}: {}. Reporting p = 0", counts, err);
            0.0
        }
    }
}

/// The chi-square approximation as [`HweTest`]
///
/// Memoizes the p-values if constructed with a cache.
///
/// # Examples
///
/// ```
/// use hwe::{ChiSquare, GenotypeCounts, HweTest};
///
/// let test = ChiSquare::new();
/// let p = test.pvalue(&GenotypeCounts::new(83, 13, 4)).unwrap();
/// assert!(p < 0.01);
///
/// // p-values are undefined without samples
/// assert!(test.pvalue(&GenotypeCounts::new(0, 0, 0)).is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ChiSquare {
    cache: Option<Arc<HweCache>>,
}

impl ChiSquare {
    /// Constructs a new chi-square test without memoization
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new chi-square test that memoizes its results in `cache`
    pub fn with_cache(cache: Arc<HweCache>) -> Self {
        Self { cache: Some(cache) }
    }
}

impl HweTest for ChiSquare {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        counts.validate()?;
        Ok(match &self.cache {
            Some(cache) => cache
                .approximate()
                .get_or_compute(counts.canonical(), || approximate(counts)),
            None => approximate(counts),
        })
    }
}
