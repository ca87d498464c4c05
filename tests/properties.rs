//! Invariants of the HWE tests: bounds, symmetry, determinism and
//! the consistency of `Fast` with its two building blocks

use std::sync::Arc;

use rayon::prelude::*;

use hwe::chisquare::approximate;
use hwe::{ChiSquare, Exact, Fast, GenotypeCounts, Hwe, HweCache, HweError, HweTest};

/// A grid of sites with small and medium sample sizes
fn sites() -> Vec<GenotypeCounts> {
    let mut sites = Vec::new();
    for hom_major in (0..300).step_by(37) {
        for het in (0..120).step_by(17) {
            for hom_minor in (0..50).step_by(9) {
                let counts = GenotypeCounts::new(hom_major, het, hom_minor);
                if !counts.is_empty() {
                    sites.push(counts);
                }
            }
        }
    }
    sites
}

#[test]
fn pvalues_are_probabilities() {
    let hwe = Hwe::new();
    for counts in sites() {
        for p in [
            hwe.exact(&counts).unwrap(),
            hwe.approximate(&counts).unwrap(),
            hwe.fast(&counts).unwrap(),
            hwe.rescaled(&counts).unwrap(),
            hwe.midp(&counts).unwrap(),
        ] {
            assert!((0.0..=1.0).contains(&p), "{counts}: {p}");
        }
    }
}

#[test]
fn symmetric() {
    let exact = Exact::new(Arc::new(HweCache::new()));
    let other = Exact::new(Arc::new(HweCache::new()));
    for counts in sites() {
        let swapped = GenotypeCounts::new(counts.hom_minor(), counts.het(), counts.hom_major());
        // separate caches, so that both orientations are really calculated
        assert_eq!(
            exact.pvalue(&counts).unwrap().to_bits(),
            other.pvalue(&swapped).unwrap().to_bits(),
            "{counts}"
        );
        assert_eq!(
            approximate(&counts).to_bits(),
            approximate(&swapped).to_bits()
        );
    }
}

#[test]
fn monomorphic_sites_are_in_equilibrium() {
    let approximate = ChiSquare::new();
    let exact = Exact::default();
    for n in [1, 2, 10, 500, 10_000] {
        for counts in [GenotypeCounts::new(n, 0, 0), GenotypeCounts::new(0, 0, n)] {
            assert_eq!(approximate.pvalue(&counts).unwrap(), 1.0);
            assert_eq!(exact.pvalue(&counts).unwrap(), 1.0);
        }
    }
}

#[test]
fn fast_is_consistent() {
    let cache = Arc::new(HweCache::new());
    let exact = Exact::new(Arc::clone(&cache));
    for cutoff in [1e-6, 1e-3, 0.05] {
        let fast = Fast::new(Arc::clone(&cache), cutoff).unwrap();
        for counts in sites() {
            let p_fast = fast.pvalue(&counts).unwrap();
            let p_approximate = approximate(&counts);
            if p_approximate >= cutoff {
                assert_eq!(p_fast.to_bits(), p_approximate.to_bits(), "{counts}");
            } else {
                assert_eq!(
                    p_fast.to_bits(),
                    exact.pvalue(&counts).unwrap().to_bits(),
                    "{counts}"
                );
            }
        }
    }
}

#[test]
fn cache_hits_do_not_recompute() {
    let hwe = Hwe::new();
    let counts = GenotypeCounts::new(500, 0, 500);
    let first = hwe.exact(&counts).unwrap();

    let probabilities = hwe.cache().probability_stats();
    let factorials = hwe.cache().factorial_stats();

    for _ in 0..10 {
        assert_eq!(hwe.exact(&counts).unwrap().to_bits(), first.to_bits());
    }
    assert_eq!(hwe.cache().exact_stats().misses, 1);
    assert_eq!(hwe.cache().exact_stats().hits, 10);
    assert_eq!(hwe.cache().probability_stats(), probabilities);
    assert_eq!(hwe.cache().factorial_stats(), factorials);
}

#[test]
fn concurrent_callers_are_deterministic() {
    let sites = sites();

    // reference values, calculated sequentially with a private cache
    let reference: Vec<u64> = {
        let exact = Exact::default();
        sites
            .iter()
            .map(|counts| exact.pvalue(counts).unwrap().to_bits())
            .collect()
    };

    // every site is requested many times from many threads
    let hwe = Hwe::new();
    let results: Vec<(usize, u64)> = (0..sites.len() * 8)
        .into_par_iter()
        .map(|i| {
            let idx = (i * 7919) % sites.len();
            (idx, hwe.exact(&sites[idx]).unwrap().to_bits())
        })
        .collect();

    for (idx, bits) in results {
        assert_eq!(bits, reference[idx], "{}", sites[idx]);
    }

    let stats = hwe.cache().exact_stats();
    // canonical duplicates share one entry
    let distinct: std::collections::HashSet<_> = sites.iter().map(|c| c.canonical()).collect();
    assert_eq!(stats.entries, distinct.len());
    assert_eq!(stats.misses, distinct.len() as u64);
}

#[test]
fn concurrent_fast_scan() {
    let hwe = Hwe::new();
    let sequential: Vec<u64> = sites()
        .iter()
        .map(|counts| Hwe::new().fast(counts).unwrap().to_bits())
        .collect();
    let parallel: Vec<u64> = sites()
        .par_iter()
        .map(|counts| hwe.fast(counts).unwrap().to_bits())
        .collect();
    assert_eq!(sequential, parallel);
}

#[test]
fn overflowing_allele_counts_are_rejected() {
    let hwe = Hwe::new();
    let counts = GenotypeCounts::new(u64::MAX / 2 + 1, 2, 0);
    let expected = Err(HweError::TooManySamples(u128::from(u64::MAX / 2) + 3));
    assert_eq!(hwe.approximate(&counts), expected);
    assert_eq!(hwe.exact(&counts), expected);
    assert_eq!(hwe.fast(&counts), expected);
    assert_eq!(hwe.rescaled(&counts), expected);
    assert_eq!(hwe.midp(&counts), expected);
    assert_eq!(hwe.passes(&counts, 0.05).map(|_| 0.0), expected);
    assert_eq!(hwe.cache().approximate_stats().entries, 0);

    // the largest valid sample is monomorphic and still tested
    let counts = GenotypeCounts::new(GenotypeCounts::MAX_SAMPLES, 0, 0);
    assert_eq!(hwe.approximate(&counts), Ok(1.0));
}

#[test]
fn invalid_input_is_rejected() {
    assert_eq!(
        GenotypeCounts::try_from((10i64, -1i64, 3i64)),
        Err(HweError::NegativeCount(-1))
    );
    assert_eq!(
        Hwe::new().exact(&GenotypeCounts::new(0, 0, 0)),
        Err(HweError::NoSamples)
    );
}
