//! Rescaled floating point exact test for Hardy-Weinberg equilibrium
//!
//! This is the exact test of Wigginton, Cutler & Abecasis (AJHG 2005) with
//! the improvements of Christopher Chang (PLINK 2):
//! - probabilities are calculated relative to the observed configuration,
//!     starting at a tiny bias instead of `1.0`. This keeps p-values down to
//!     the smallest representable `f64` within reach.
//! - the tails are only walked until the partial sums stop changing
//! - a mid-p variant (Graffelman & Moreno, 2013)
//! - a threshold-only test that can often exit early
//!
//! Neighbouring configurations relate by
//!
//! ```text
//! P(Aa + 2) = P(Aa) * 4 * AA * aa / ((Aa + 2) * (Aa + 1))
//! ```
//!
//! so no factorials are needed. The result agrees with [`crate::Exact`] to
//! about 1e-12 relative, but is much cheaper. It does not use the cache.
use tracing::trace;

use crate::genotype::f64_from_u64;
use crate::{GenotypeCounts, HweResult, HweTest};

/// `2^-44`. Makes the observed configuration compare slightly smaller
/// than ties, so floating point errors do not move ties out of the tail.
const SMALL_EPSILON: f64 = 5.684_341_886_080_802e-14;

/// `2^-83`. Relative probability of the observed configuration.
const EXACT_TEST_BIAS: f64 = 1.033_975_765_691_284_6e-25;

/// The rescaled exact test as [`HweTest`]
///
/// # Examples
///
/// ```
/// use hwe::{GenotypeCounts, HweTest, RescaledExact};
///
/// let counts = GenotypeCounts::new(2, 1, 3);
///
/// let p = RescaledExact::new().pvalue(&counts).unwrap();
/// assert!((p - 0.151_515_151_515).abs() < 1e-9);
///
/// let midp = RescaledExact::midp().pvalue(&counts).unwrap();
/// assert!((midp - 0.075_757_575_757).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescaledExact {
    midp: bool,
}

impl RescaledExact {
    /// Constructs the standard rescaled exact test
    pub fn new() -> Self {
        Self { midp: false }
    }

    /// Constructs the mid-p variant of the rescaled exact test
    pub fn midp() -> Self {
        Self { midp: true }
    }

    /// Returns `true` for the mid-p variant
    pub fn is_midp(&self) -> bool {
        self.midp
    }
}

impl HweTest for RescaledExact {
    fn pvalue(&self, counts: &GenotypeCounts) -> HweResult<f64> {
        counts.validate()?;
        Ok(if self.midp {
            snphwe_midp(counts)
        } else {
            snphwe(counts)
        })
    }
}

/// A walk along the heterozygote counts with fixed allele counts
///
/// `p` is the probability of the current configuration, relative
/// to the starting configuration.
#[derive(Debug, Clone, Copy)]
struct Walk {
    het: f64,
    hom_rare: f64,
    hom_common: f64,
    p: f64,
}

impl Walk {
    /// Starts a walk at the canonical `counts` with relative probability `p`
    fn new(counts: &GenotypeCounts, p: f64) -> Self {
        Self {
            het: f64_from_u64(counts.het()),
            hom_rare: f64_from_u64(counts.hom_minor()),
            hom_common: f64_from_u64(counts.hom_major()),
            p,
        }
    }

    /// Steps to two heterozygotes fewer. Returns `false` if impossible
    fn fewer_hets(&mut self) -> bool {
        if self.het < 2.0 {
            return false;
        }
        self.hom_rare += 1.0;
        self.hom_common += 1.0;
        self.p *= (self.het * (self.het - 1.0)) / (4.0 * self.hom_rare * self.hom_common);
        self.het -= 2.0;
        true
    }

    /// Steps to two heterozygotes more. Returns `false` if impossible
    fn more_hets(&mut self) -> bool {
        if self.hom_rare < 1.0 {
            return false;
        }
        self.het += 2.0;
        self.p *= (4.0 * self.hom_rare * self.hom_common) / (self.het * (self.het - 1.0));
        self.hom_rare -= 1.0;
        self.hom_common -= 1.0;
        true
    }

    /// Probability ratio of the next [`Walk::fewer_hets`] step
    fn fewer_hets_ratio(&self) -> f64 {
        (self.het * (self.het - 1.0)) / (4.0 * (self.hom_rare + 1.0) * (self.hom_common + 1.0))
    }

    /// Probability ratio of the next [`Walk::more_hets`] step
    fn more_hets_ratio(&self) -> f64 {
        (4.0 * self.hom_rare * self.hom_common) / ((self.het + 2.0) * (self.het + 1.0))
    }
}

/// The walking directions, relative to the observed configuration
///
/// Probabilities increase towards the expected heterozygote count (the
/// center) and decrease monotonically beyond it and in the other direction.
#[derive(Clone, Copy)]
struct Directions {
    to_center: fn(&mut Walk) -> bool,
    away: fn(&mut Walk) -> bool,
    to_center_ratio: fn(&Walk) -> f64,
    away_ratio: fn(&Walk) -> f64,
}

impl Directions {
    fn new(counts: &GenotypeCounts) -> Self {
        let genotypes2 = u128::from(counts.allele_count());
        let rare_copies = u128::from(counts.minor_alleles());
        // more heterozygotes observed than expected: the center lies
        // towards fewer heterozygotes
        if u128::from(counts.het()) * genotypes2 > rare_copies * (genotypes2 - rare_copies) {
            Self {
                to_center: Walk::fewer_hets,
                away: Walk::more_hets,
                to_center_ratio: Walk::fewer_hets_ratio,
                away_ratio: Walk::more_hets_ratio,
            }
        } else {
            Self {
                to_center: Walk::more_hets,
                away: Walk::fewer_hets,
                to_center_ratio: Walk::more_hets_ratio,
                away_ratio: Walk::fewer_hets_ratio,
            }
        }
    }
}

/// Adds `p` to `sum`. Returns `false` if `sum` did not change
fn accumulate(sum: &mut f64, p: f64) -> bool {
    let previous = *sum;
    *sum += p;
    *sum > previous
}

/// Calculates the rescaled exact HWE p-value
///
/// Returns `1.0` for empty counts.
///
/// # Panics
///
/// The counts are not validated. Allele counts that overflow `u64` panic
/// in debug builds, [`RescaledExact`] rejects them.
///
/// # Examples
///
/// ```
/// use hwe::GenotypeCounts;
/// use hwe::rescaled::snphwe;
///
/// let p = snphwe(&GenotypeCounts::new(500, 0, 500));
/// assert!((p / 1.319_669_097_657e-301 - 1.0).abs() < 1e-9);
/// ```
pub fn snphwe(counts: &GenotypeCounts) -> f64 {
    rescaled(counts, false)
}

/// Calculates the mid-p variant of the rescaled exact HWE p-value
///
/// Configurations that are exactly as likely as the observed one only
/// contribute half of their probability. Returns `0.5` for empty counts.
pub fn snphwe_midp(counts: &GenotypeCounts) -> f64 {
    rescaled(counts, true)
}

fn rescaled(counts: &GenotypeCounts, midp: bool) -> f64 {
    if counts.is_empty() {
        return if midp { 0.5 } else { 1.0 };
    }
    let counts = counts.canonical();
    let directions = Directions::new(&counts);
    let start = (1.0 - SMALL_EPSILON) * EXACT_TEST_BIAS;

    let mut tail = start;
    let mut center = 0.0;
    let mut ties = 1u32;

    // sum up the center, everything more likely than the observed configuration
    let mut inner = Walk::new(&counts, start);
    while (directions.to_center)(&mut inner) {
        if inner.p < EXACT_TEST_BIAS {
            if inner.p > (1.0 - 2.0 * SMALL_EPSILON) * EXACT_TEST_BIAS {
                ties += 1;
            }
            tail += inner.p;
            break;
        }
        center += inner.p;
        if center.is_infinite() {
            return 0.0;
        }
    }
    if center == 0.0 && !midp {
        return 1.0;
    }

    // the tail on the far side of the center
    while (directions.to_center)(&mut inner) {
        if !accumulate(&mut tail, inner.p) {
            break;
        }
    }

    // the tail on the near side
    let mut outer = Walk::new(&counts, start);
    while (directions.away)(&mut outer) {
        if !accumulate(&mut tail, outer.p) {
            break;
        }
    }

    trace!("{}: tail {:e}, center {:e}, ties {}", counts, tail, center, ties);
    if midp {
        (tail - start * 0.5 * f64::from(ties)) / (tail + center)
    } else {
        tail / (tail + center)
    }
}

/// Tests whether the HWE p-value is below `threshold`
///
/// Returns `true` if the site is out of equilibrium at the given threshold,
/// `false` if it passes. This is usually much cheaper than calculating the
/// p-value: the tails are bounded by geometric series and the walk exits as
/// soon as the outcome is certain.
///
/// Empty counts always pass. The `threshold` must be within `(0, 1)`.
///
/// # Examples
///
/// ```
/// use hwe::GenotypeCounts;
/// use hwe::rescaled::snphwe_threshold;
///
/// let counts = GenotypeCounts::new(500, 0, 2); // p = 2.988e-6
/// assert!(snphwe_threshold(&counts, 1e-5));
/// assert!(!snphwe_threshold(&counts, 1e-6));
/// ```
pub fn snphwe_threshold(counts: &GenotypeCounts, threshold: f64) -> bool {
    if counts.is_empty() {
        return false;
    }
    let counts = counts.canonical();
    let directions = Directions::new(&counts);

    let mut inner = Walk::new(&counts, (1.0 - SMALL_EPSILON) * EXACT_TEST_BIAS);
    let mut probe = inner;
    if !(directions.to_center)(&mut probe) {
        // the observed configuration is the most likely one
        return false;
    }

    // reverse odds ratio of the threshold
    let odds = (1.0 - threshold) / threshold;
    let mut outer_tail = inner.p;
    let mut inner_tail = 0.0;
    let mut center = 0.0;

    // the center sum alone can prove failure
    let mut exit = f64_from_u64(counts.minor_alleles()) * odds * EXACT_TEST_BIAS;
    while (directions.to_center)(&mut inner) {
        if inner.p < EXACT_TEST_BIAS {
            inner_tail = inner.p;
            break;
        }
        center += inner.p;
        if center > exit {
            return true;
        }
    }

    // from here on, the tails must reach `exit` to pass
    exit = center / odds;
    if outer_tail + inner_tail >= exit {
        return false;
    }

    // c + cr + cr^2 + ... = c / (1 - r) bounds the remaining tails
    let inner_ceil = inner_tail / (1.0 - (directions.to_center_ratio)(&inner));
    let mut outer = Walk::new(&counts, outer_tail);
    let outer_ceil = outer_tail / (1.0 - (directions.away_ratio)(&outer));
    if outer_ceil + inner_ceil < exit {
        return true;
    }

    if (directions.away)(&mut outer) {
        outer_tail += outer.p;
    }
    let exit_outer = exit - inner_tail;
    while (directions.away)(&mut outer) {
        let previous = outer_tail;
        outer_tail += outer.p;
        if outer_tail > exit_outer {
            return false;
        }
        if outer_tail <= previous {
            break;
        }
    }
    if outer_tail + inner_ceil < exit {
        return true;
    }

    let exit_inner = exit - outer_tail;
    while (directions.to_center)(&mut inner) {
        let previous = inner_tail;
        inner_tail += inner.p;
        if inner_tail >= exit_inner {
            return false;
        }
        if inner_tail <= previous {
            return true;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constants() {
        assert!((SMALL_EPSILON - 2f64.powi(-44)).abs() < f64::EPSILON * SMALL_EPSILON);
        assert!((EXACT_TEST_BIAS - 2f64.powi(-83)).abs() < f64::EPSILON * EXACT_TEST_BIAS);
    }

    #[test]
    fn walk_steps() {
        let mut walk = Walk::new(&GenotypeCounts::new(3, 1, 2), 10.0);
        assert!(!walk.fewer_hets());
        assert!(walk.more_hets());
        // 10/66 -> 40/66
        assert!((walk.p - 40.0).abs() < 1e-12);
        assert!(walk.more_hets());
        assert!((walk.p - 16.0).abs() < 1e-12);
        assert!(!walk.more_hets());
        assert!(walk.fewer_hets());
        assert!((walk.p - 40.0).abs() < 1e-12);
    }

    #[test]
    fn step_ratios() {
        let walk = Walk::new(&GenotypeCounts::new(2, 3, 1), 1.0);
        let mut more = walk;
        more.more_hets();
        assert!((walk.more_hets_ratio() - more.p).abs() < 1e-15);

        let mut fewer = walk;
        fewer.fewer_hets();
        assert!((walk.fewer_hets_ratio() - fewer.p).abs() < 1e-15);
    }

    #[test]
    fn pvalues() {
        assert!((snphwe(&GenotypeCounts::new(2, 1, 3)) - 10.0 / 66.0).abs() < 1e-12);
        assert!((snphwe(&GenotypeCounts::new(83, 13, 4)) - 0.010_293).abs() < 1e-6);
        assert!((snphwe(&GenotypeCounts::new(50, 57, 14)) - 0.842_279_756_570_8).abs() < 1e-12);
        assert!((snphwe(&GenotypeCounts::new(500, 2, 0)) - 1.0).abs() < 1e-12);
        assert!(
            (snphwe(&GenotypeCounts::new(50_000, 0, 1)) - 0.000_009_999_900_001).abs() < 1e-12
        );
    }

    #[test]
    fn large_disequilibrium() {
        assert_eq!(snphwe(&GenotypeCounts::new(50_000, 300_000, 50_000)), 0.0);
        assert_eq!(snphwe(&GenotypeCounts::new(50_000, 300, 50_000)), 0.0);
        assert_eq!(snphwe(&GenotypeCounts::new(50_001, 301, 50_001)), 0.0);
    }

    #[test]
    fn midp() {
        let midp = |hom_major, het, hom_minor| {
            snphwe_midp(&GenotypeCounts::new(hom_major, het, hom_minor))
        };
        assert!((midp(2, 1, 3) - 5.0 / 66.0).abs() < 1e-12);
        assert!((midp(500, 2, 0) - 0.500_498_504_486_540_3).abs() < 1e-12);
        assert!((midp(83, 13, 4) - 0.005_606_146_508_292).abs() < 1e-12);
    }

    #[test]
    fn empty() {
        assert_eq!(snphwe(&GenotypeCounts::default()), 1.0);
        assert_eq!(snphwe_midp(&GenotypeCounts::default()), 0.5);
        assert!(!snphwe_threshold(&GenotypeCounts::default(), 0.05));
    }

    #[test]
    fn threshold() {
        let counts = GenotypeCounts::new(83, 13, 4);
        assert!(snphwe_threshold(&counts, 0.05));
        assert!(snphwe_threshold(&counts, 0.011));
        assert!(!snphwe_threshold(&counts, 0.01));
        assert!(!snphwe_threshold(&counts, 1e-6));

        let counts = GenotypeCounts::new(50, 57, 14);
        assert!(!snphwe_threshold(&counts, 0.05));
        assert!(snphwe_threshold(&counts, 0.9));

        // the most likely configuration never fails
        assert!(!snphwe_threshold(&GenotypeCounts::new(2, 3, 1), 0.5));
    }

    #[test]
    fn threshold_agrees_with_pvalue() {
        for hom_major in (0..120).step_by(7) {
            for het in (0..80).step_by(5) {
                for hom_minor in (0..30).step_by(3) {
                    let counts = GenotypeCounts::new(hom_major, het, hom_minor);
                    if counts.is_empty() {
                        continue;
                    }
                    let p = snphwe(&counts);
                    for threshold in [1e-6, 1e-3, 0.05, 0.3] {
                        if ((p - threshold) / threshold).abs() < 1e-6 {
                            continue;
                        }
                        assert_eq!(
                            snphwe_threshold(&counts, threshold),
                            p < threshold,
                            "{counts} at {threshold}: p = {p}"
                        );
                    }
                }
            }
        }
    }
}
