//! Exact and approximate tests for Hardy-Weinberg equilibrium (HWE)
//!
//! `hwe` calculates p-values for biallelic genotype counts: the number of
//! individuals that are homozygous for the major allele (`AA`), heterozygous
//! (`Aa`) and homozygous for the minor allele (`aa`) at a single site.
//!
//! The crate provides
//! - [`ChiSquare`]: the classic 1-degree-of-freedom asymptotic test. Cheap.
//! - [`Exact`]: the exact two-sided test, enumerating the discrete null
//!     distribution with arbitrary-precision integer arithmetic. Expensive.
//! - [`Fast`]: runs the approximation first and only escalates to the exact
//!     test when the approximation indicates possible significance.
//! - [`RescaledExact`]: the floating point exact test of Wigginton et al. with
//!     rescaling, including the mid-p variant.
//!
//! All exact computations are memoized in an explicit [`HweCache`] that is
//! shared between tests and threads.
//!
//! # Examples
//!
//! ```
//! use hwe::{GenotypeCounts, Hwe};
//!
//! let hwe = Hwe::default();
//! let counts = GenotypeCounts::new(83, 13, 4);
//!
//! let p = hwe.exact(&counts).unwrap();
//! assert!((p - 0.010293).abs() < 1e-6);
//!
//! // the approximation is good enough for sites far from significance
//! let p = hwe.fast(&GenotypeCounts::new(50, 57, 14)).unwrap();
//! assert!(p > 0.5);
//! ```
use thiserror::Error;

pub mod cache;
pub mod chisquare;
pub mod exact;
pub mod fast;
mod genotype;
mod method;
pub mod rescaled;

pub use cache::HweCache;
pub use chisquare::ChiSquare;
pub use exact::Exact;
pub use fast::Fast;
pub use genotype::GenotypeCounts;
pub use method::{Builtins, Hwe, HweTest};
pub use rescaled::RescaledExact;

/// The default significance cutoff of the [`Fast`] test
///
/// Sites with an approximate p-value below this cutoff are re-tested
/// with the [`Exact`] test.
pub const DEFAULT_CUTOFF: f64 = 1e-6;

/// Main Error type for this crate
#[derive(Error, Debug, PartialEq)]
pub enum HweError {
    /// A p-value is not defined without samples
    #[error("no samples: all genotype counts are zero")]
    NoSamples,
    /// Genotype counts must not be negative
    #[error("negative genotype count: {0}")]
    NegativeCount(i64),
    /// Genotype counts must be finite, non-negative whole numbers
    #[error("invalid genotype count: {0}")]
    InvalidCount(f64),
    /// The allele count `2 * N` must fit into `u64`
    #[error("too many samples: {0}")]
    TooManySamples(u128),
    /// The significance cutoff must be within `(0, 1]`
    #[error("invalid significance cutoff: {0}")]
    InvalidCutoff(f64),
    /// The chi-square distribution could not be evaluated
    #[error("unable to evaluate distribution: {0}")]
    Distribution(String),
    /// The name does not match any of the [`Builtins`]
    #[error("unknown HWE test: {0}")]
    UnknownMethod(String),
}

impl From<statrs::StatsError> for HweError {
    fn from(err: statrs::StatsError) -> Self {
        HweError::Distribution(err.to_string())
    }
}

/// Shortcut for `Result<T, HweError>`
pub type HweResult<T> = Result<T, HweError>;
