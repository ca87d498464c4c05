//! Combined approximate and exact HWE test
//!
//! Most sites of a genome-wide scan are nowhere near significance. For those,
//! the chi-square approximation is good enough and orders of magnitude cheaper
//! than the exact test. [`Fast`] only pays for the exact test when the
//! approximation falls below the significance cutoff.
use std::sync::Arc;

use tracing::debug;

use crate::chisquare::ChiSquare;
use crate::exact::Exact;
use crate::{GenotypeCounts, HweCache, HweError, HweResult, HweTest, DEFAULT_CUTOFF};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Chi-square approximation with exact re-test of significant sites
///
/// ```mermaid
/// flowchart LR
///     counts[GenotypeCounts] --> chi[ChiSquare]
///     chi -- "p >= cutoff" --> result[p-value]
///     chi -- "p < cutoff" --> exact[Exact]
///     exact --> result
///     chi <-.-> cache[(HweCache)]
///     exact <-.-> cache
/// ```
///
/// The returned p-value is therefore
/// - the approximate p-value, if it is at least `cutoff`
/// - the exact p-value otherwise
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hwe::{Fast, GenotypeCounts, HweCache, HweTest};
/// use hwe::chisquare::approximate;
///
/// let cache = Arc::new(HweCache::new());
/// let fast = Fast::new(Arc::clone(&cache), 0.05).unwrap();
///
/// // not significant: the approximation is returned
/// let counts = GenotypeCounts::new(50, 57, 14);
/// assert_eq!(fast.pvalue(&counts).unwrap(), approximate(&counts));
///
/// // significant: the exact p-value is returned
/// let counts = GenotypeCounts::new(83, 13, 4);
/// assert!((fast.pvalue(&counts).unwrap() - 0.010293).abs() < 1e-6);
/// assert_eq!(cache.exact_stats().misses, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Fast {
    approximate: ChiSquare,
    exact: Exact,
    cutoff: f64,
}

impl Fast {
    /// Constructs a new `Fast` test with the given significance `cutoff`
    ///
    /// # Errors
    ///
    /// [`HweError::InvalidCutoff`] if the cutoff is not within `(0, 1]`
    pub fn new(cache: Arc<HweCache>, cutoff: f64) -> HweResult<Self> {
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(HweError::InvalidCutoff(cutoff));
        }
        Ok(Self {
            approximate: ChiSquare::with_cache(Arc::clone(&cache)),
            exact: Exact::new(cache),
            cutoff,
        })
    }

    /// Constructs a new `Fast` test with the [`DEFAULT_CUTOFF`]
    pub fn with_cache(cache: Arc<HweCache>) -> Self {
        Self {
            approximate: ChiSquare::with_cache(Arc::clone(&cache)),
            exact: Exact::new(cache),
            cutoff: DEFAULT_CUTOFF,
        }
    }

    /// The significance cutoff below which the exact test is used
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl Default for Fast {
    fn default() -> Self {
        Self::with_cache(Arc::new(HweCache::new()))
    }
}

impl HweTest for Fast {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        let approximate = self.approximate.pvalue(counts)?;
        if approximate < self.cutoff {
            debug!(
                "Approximate p-value {:e} of {} below cutoff {:e}, running exact test",
                approximate, counts, self.cutoff
            );
            return self.exact.pvalue(counts);
        }
        Ok(approximate)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chisquare::approximate;

    #[test]
    fn invalid_cutoff() {
        let cache = Arc::new(HweCache::new());
        assert_eq!(
            Fast::new(Arc::clone(&cache), 0.0).unwrap_err(),
            HweError::InvalidCutoff(0.0)
        );
        assert!(Fast::new(Arc::clone(&cache), -0.5).is_err());
        assert!(Fast::new(Arc::clone(&cache), 1.5).is_err());
        assert!(Fast::new(Arc::clone(&cache), f64::NAN).is_err());
        assert!(Fast::new(cache, 1.0).is_ok());
    }

    #[test]
    fn default_cutoff() {
        assert!((Fast::default().cutoff() - DEFAULT_CUTOFF).abs() < f64::EPSILON);
    }

    #[test]
    fn approximation_above_cutoff() {
        let cache = Arc::new(HweCache::new());
        let fast = Fast::with_cache(Arc::clone(&cache));

        let counts = GenotypeCounts::new(83, 13, 4);
        let p = fast.pvalue(&counts).unwrap();
        assert_eq!(p.to_bits(), approximate(&counts).to_bits());
        assert_eq!(cache.exact_stats().entries, 0);
    }

    #[test]
    fn exact_below_cutoff() {
        let cache = Arc::new(HweCache::new());
        let fast = Fast::with_cache(Arc::clone(&cache));
        let exact = Exact::new(Arc::clone(&cache));

        let counts = GenotypeCounts::new(500, 0, 2);
        let p = fast.pvalue(&counts).unwrap();
        assert_eq!(p.to_bits(), exact.pvalue(&counts).unwrap().to_bits());
        assert!((p - 0.000_002_988_038_880_362).abs() < 1e-12);
    }

    #[test]
    fn cutoff_of_one_is_always_exact() {
        let fast = Fast::new(Arc::new(HweCache::new()), 1.0).unwrap();
        let p = fast.pvalue(&GenotypeCounts::new(2, 1, 3)).unwrap();
        assert!((p - 0.151_515_151_515_15).abs() < 1e-12);
    }

    #[test]
    fn no_samples() {
        assert_eq!(
            Fast::default().pvalue(&GenotypeCounts::new(0, 0, 0)),
            Err(HweError::NoSamples)
        );
    }
}
