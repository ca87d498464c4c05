//! The [`HweTest`] trait, the [`Builtins`] tests and the [`Hwe`] interface
use std::sync::Arc;

use crate::rescaled::snphwe_threshold;
use crate::{
    ChiSquare, Exact, Fast, GenotypeCounts, HweCache, HweError, HweResult, RescaledExact,
};

/// Trait for Hardy-Weinberg equilibrium tests
///
/// All tests are pure functions of the genotype counts: identical
/// counts always produce a bit-identical p-value, regardless of
/// caching and of the thread that calls the test.
pub trait HweTest {
    /// Returns the p-value of the genotype counts
    ///
    /// # Errors
    ///
    /// - [`HweError::NoSamples`] if all genotype counts are zero
    /// - [`HweError::TooManySamples`] if the allele count `2 * N` overflows
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64>;
}

impl<T: HweTest + ?Sized> HweTest for &T {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        (**self).pvalue(counts)
    }
}

impl<T: HweTest + ?Sized> HweTest for Box<T> {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        (**self).pvalue(counts)
    }
}

/// All tests that `hwe` provides
///
/// This is useful if the test is chosen at runtime, e.g. from a
/// command line argument of a downstream tool.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hwe::{Builtins, GenotypeCounts, HweCache, HweTest};
///
/// let cache = Arc::new(HweCache::new());
/// let test = Builtins::new("exact", cache).unwrap();
///
/// let p = test.pvalue(&GenotypeCounts::new(83, 13, 4)).unwrap();
/// assert!((p - 0.010293).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub enum Builtins {
    /// [`ChiSquare`] approximation
    ChiSquare(ChiSquare),
    /// [`Exact`] test with arbitrary precision
    Exact(Exact),
    /// [`Fast`] approximation with exact re-test
    Fast(Fast),
    /// [`RescaledExact`] floating point test, optionally mid-p
    Rescaled(RescaledExact),
}

impl Builtins {
    /// Constructs one of the builtin tests by name, using the [`crate::DEFAULT_CUTOFF`]
    ///
    /// Valid names are
    /// - `chisquare` or `approximate`
    /// - `exact`
    /// - `fast`
    /// - `rescaled`
    /// - `midp`
    ///
    /// # Errors
    ///
    /// [`HweError::UnknownMethod`] if the name is not a builtin test
    pub fn new(method: &str, cache: Arc<HweCache>) -> HweResult<Self> {
        match method.to_lowercase().as_str() {
            "chisquare" | "approximate" => Ok(Self::ChiSquare(ChiSquare::with_cache(cache))),
            "exact" => Ok(Self::Exact(Exact::new(cache))),
            "fast" => Ok(Self::Fast(Fast::with_cache(cache))),
            "rescaled" => Ok(Self::Rescaled(RescaledExact::new())),
            "midp" => Ok(Self::Rescaled(RescaledExact::midp())),
            _ => Err(HweError::UnknownMethod(method.to_string())),
        }
    }
}

impl HweTest for Builtins {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        match self {
            Builtins::ChiSquare(test) => test.pvalue(counts),
            Builtins::Exact(test) => test.pvalue(counts),
            Builtins::Fast(test) => test.pvalue(counts),
            Builtins::Rescaled(test) => test.pvalue(counts),
        }
    }
}

/// `Hwe` is the main interface of the `hwe` crate
///
/// It owns a shared [`HweCache`] and provides all tests as methods.
/// `Hwe` is cheap to clone, all clones share the same cache.
///
/// # Examples
///
/// ```
/// use hwe::{GenotypeCounts, Hwe};
///
/// let hwe = Hwe::new();
/// let counts = GenotypeCounts::new(500, 4, 2);
///
/// let exact = hwe.exact(&counts).unwrap();
/// assert!((exact - 0.000_205_044_951_892_1).abs() < 1e-10);
///
/// // the approximation is far off for rare alleles
/// let approximate = hwe.approximate(&counts).unwrap();
/// assert!(approximate < 1e-20);
///
/// // but `fast` re-tests it exactly
/// assert_eq!(hwe.fast(&counts).unwrap(), exact);
///
/// assert!(!hwe.passes(&counts, 0.001).unwrap());
/// assert!(hwe.passes(&counts, 0.0001).unwrap());
///
/// // without any samples, there is no p-value
/// assert!(hwe.exact(&GenotypeCounts::new(0, 0, 0)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Hwe {
    cache: Arc<HweCache>,
}

impl Hwe {
    /// Constructs a new `Hwe` with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new `Hwe` that uses an existing cache
    pub fn with_cache(cache: Arc<HweCache>) -> Self {
        Self { cache }
    }

    /// Returns the shared cache
    pub fn cache(&self) -> &Arc<HweCache> {
        &self.cache
    }

    /// Calculates the [`ChiSquare`] p-value
    ///
    /// # Errors
    ///
    /// [`HweError::NoSamples`] if all genotype counts are zero
    pub fn approximate(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        ChiSquare::with_cache(Arc::clone(&self.cache)).pvalue(counts)
    }

    /// Calculates the [`Exact`] p-value
    ///
    /// # Errors
    ///
    /// [`HweError::NoSamples`] if all genotype counts are zero
    pub fn exact(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        Exact::new(Arc::clone(&self.cache)).pvalue(counts)
    }

    /// Calculates the [`Fast`] p-value with the [`crate::DEFAULT_CUTOFF`]
    ///
    /// # Errors
    ///
    /// [`HweError::NoSamples`] if all genotype counts are zero
    pub fn fast(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        Fast::with_cache(Arc::clone(&self.cache)).pvalue(counts)
    }

    /// Calculates the [`Fast`] p-value with a custom `cutoff`
    ///
    /// # Errors
    ///
    /// - [`HweError::InvalidCutoff`] if the cutoff is not within `(0, 1]`
    /// - [`HweError::NoSamples`] if all genotype counts are zero
    pub fn fast_with_cutoff(&self, counts: &GenotypeCounts, cutoff: f64) -> HweResult<f64> {
        Fast::new(Arc::clone(&self.cache), cutoff)?.pvalue(counts)
    }

    /// Calculates the [`RescaledExact`] p-value
    ///
    /// # Errors
    ///
    /// [`HweError::NoSamples`] if all genotype counts are zero
    pub fn rescaled(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        RescaledExact::new().pvalue(counts)
    }

    /// Calculates the mid-p variant of the [`RescaledExact`] p-value
    ///
    /// # Errors
    ///
    /// [`HweError::NoSamples`] if all genotype counts are zero
    pub fn midp(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        RescaledExact::midp().pvalue(counts)
    }

    /// Returns `true` if the site is in equilibrium at the given threshold
    ///
    /// This checks whether the exact p-value is at least `threshold`,
    /// which is usually cheaper than calculating the p-value.
    ///
    /// # Errors
    ///
    /// - [`HweError::InvalidCutoff`] if the threshold is not within `(0, 1)`
    /// - [`HweError::NoSamples`] if all genotype counts are zero
    pub fn passes(&self, counts: &GenotypeCounts, threshold: f64) -> HweResult<bool> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(HweError::InvalidCutoff(threshold));
        }
        counts.validate()?;
        Ok(!snphwe_threshold(counts, threshold))
    }

    /// Returns one of the [`Builtins`] tests, sharing this cache
    ///
    /// # Errors
    ///
    /// [`HweError::UnknownMethod`] if the name is not a builtin test
    pub fn builtin(&self, method: &str) -> HweResult<Builtins> {
        Builtins::new(method, Arc::clone(&self.cache))
    }
}
