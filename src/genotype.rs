use core::fmt::Debug;
use std::fmt::Display;

use crate::{HweError, HweResult};

/// Genotype counts of a single biallelic site
///
/// `GenotypeCounts` holds the number of individuals that are homozygous
/// for the major allele (`AA`), heterozygous (`Aa`) and homozygous for
/// the minor allele (`aa`).
///
/// The counts are not required to be sorted: which homozygote is called
/// "major" does not change any of the p-values. Use [`GenotypeCounts::canonical`]
/// to get the representation with the larger homozygote count first.
///
/// # Examples
///
/// ```
/// use hwe::GenotypeCounts;
///
/// let counts = GenotypeCounts::new(2, 1, 3);
/// assert_eq!(counts.sample_size(), 6);
/// assert_eq!(counts.major_alleles(), 5);
/// assert_eq!(counts.minor_alleles(), 7);
///
/// let canonical = counts.canonical();
/// assert_eq!(canonical, GenotypeCounts::new(3, 1, 2));
///
/// // signed input is validated
/// assert!(GenotypeCounts::try_from((2i64, -1i64, 3i64)).is_err());
/// ```
#[derive(Copy, Clone, Default, Eq, Hash, PartialEq)]
pub struct GenotypeCounts {
    hom_major: u64,
    het: u64,
    hom_minor: u64,
}

impl GenotypeCounts {
    /// The largest sample size `N` whose allele count `2 * N` fits into `u64`
    ///
    /// The allele counts of larger samples overflow. All tests reject them
    /// with [`HweError::TooManySamples`].
    pub const MAX_SAMPLES: u64 = u64::MAX / 2;

    /// Constructs new `GenotypeCounts` from the number of
    /// homozygous major (`AA`), heterozygous (`Aa`) and
    /// homozygous minor (`aa`) individuals
    pub const fn new(hom_major: u64, het: u64, hom_minor: u64) -> Self {
        Self {
            hom_major,
            het,
            hom_minor,
        }
    }

    /// Number of individuals homozygous for the major allele (`AA`)
    pub fn hom_major(&self) -> u64 {
        self.hom_major
    }

    /// Number of heterozygous individuals (`Aa`)
    pub fn het(&self) -> u64 {
        self.het
    }

    /// Number of individuals homozygous for the minor allele (`aa`)
    pub fn hom_minor(&self) -> u64 {
        self.hom_minor
    }

    /// The number of individuals `N`
    pub fn sample_size(&self) -> u64 {
        self.hom_major + self.het + self.hom_minor
    }

    /// Returns `true` if there are no individuals at all
    pub fn is_empty(&self) -> bool {
        self.sample_size() == 0
    }

    /// The number of major alleles: `2 * AA + Aa`
    pub fn major_alleles(&self) -> u64 {
        2 * self.hom_major + self.het
    }

    /// The number of minor alleles: `Aa + 2 * aa`
    pub fn minor_alleles(&self) -> u64 {
        self.het + 2 * self.hom_minor
    }

    /// The total number of alleles: `2 * N`
    pub fn allele_count(&self) -> u64 {
        2 * self.sample_size()
    }

    /// Frequency of the major allele
    ///
    /// Returns `None` if there are no samples
    pub fn major_allele_frequency(&self) -> Option<f64> {
        self.frequency(self.major_alleles())
    }

    /// Frequency of the minor allele
    ///
    /// Returns `None` if there are no samples
    pub fn minor_allele_frequency(&self) -> Option<f64> {
        self.frequency(self.minor_alleles())
    }

    fn frequency(&self, alleles: u64) -> Option<f64> {
        match self.allele_count() {
            0 => None,
            total => Some(f64_from_u64(alleles) / f64_from_u64(total)),
        }
    }

    /// Returns `true` if one of the two alleles is absent
    ///
    /// Monomorphic sites are trivially in equilibrium. Empty sites are
    /// monomorphic as well.
    pub fn is_monomorphic(&self) -> bool {
        self.major_alleles() == 0 || self.minor_alleles() == 0
    }

    /// Returns the counts with the larger homozygote count first
    ///
    /// All tests are symmetric in `AA` and `aa`, so the canonical
    /// counts are used as cache key and as anchor of the exact test.
    #[must_use]
    pub fn canonical(&self) -> Self {
        if self.hom_minor > self.hom_major {
            Self::new(self.hom_minor, self.het, self.hom_major)
        } else {
            *self
        }
    }

    /// Checks that the counts can be tested
    ///
    /// - [`HweError::NoSamples`] for empty counts
    /// - [`HweError::TooManySamples`] if `2 * N` does not fit into `u64`
    pub(crate) fn validate(&self) -> HweResult<()> {
        match self.wide_sample_size() {
            0 => Err(HweError::NoSamples),
            _ => self.check_size().map(|_| ()),
        }
    }

    fn check_size(self) -> HweResult<Self> {
        let n = self.wide_sample_size();
        if n > u128::from(Self::MAX_SAMPLES) {
            Err(HweError::TooManySamples(n))
        } else {
            Ok(self)
        }
    }

    fn wide_sample_size(&self) -> u128 {
        u128::from(self.hom_major) + u128::from(self.het) + u128::from(self.hom_minor)
    }
}

impl From<(u64, u64, u64)> for GenotypeCounts {
    fn from(counts: (u64, u64, u64)) -> Self {
        Self::new(counts.0, counts.1, counts.2)
    }
}

impl From<[u64; 3]> for GenotypeCounts {
    fn from(counts: [u64; 3]) -> Self {
        Self::new(counts[0], counts[1], counts[2])
    }
}

impl From<(u32, u32, u32)> for GenotypeCounts {
    fn from(counts: (u32, u32, u32)) -> Self {
        Self::new(counts.0.into(), counts.1.into(), counts.2.into())
    }
}

impl TryFrom<(i64, i64, i64)> for GenotypeCounts {
    type Error = HweError;
    fn try_from(counts: (i64, i64, i64)) -> HweResult<Self> {
        let convert = |n: i64| u64::try_from(n).map_err(|_| HweError::NegativeCount(n));
        Self::new(convert(counts.0)?, convert(counts.1)?, convert(counts.2)?).check_size()
    }
}

impl TryFrom<(f64, f64, f64)> for GenotypeCounts {
    type Error = HweError;
    /// Converts counts that were summed up from dosages or genotype
    /// probabilities. Only whole, non-negative numbers are accepted.
    fn try_from(counts: (f64, f64, f64)) -> HweResult<Self> {
        Self::new(
            u64_from_f64(counts.0)?,
            u64_from_f64(counts.1)?,
            u64_from_f64(counts.2)?,
        )
        .check_size()
    }
}

impl Debug for GenotypeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GenotypeCounts({})", self)
    }
}

impl Display for GenotypeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.hom_major, self.het, self.hom_minor)
    }
}

// 2^53, the largest range of integers that f64 represents exactly
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn u64_from_f64(n: f64) -> HweResult<u64> {
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= MAX_EXACT_F64 {
        Ok(n as u64)
    } else {
        Err(HweError::InvalidCount(n))
    }
}

/// Genotype counts are far below 2^53, so the conversion is exact
/// for every realistic cohort.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn f64_from_u64(n: u64) -> f64 {
    n as f64
}
