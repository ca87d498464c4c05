//! Genome-wide style HWE scan over synthetic sites
//!
//! `cargo run --release --example scan [NUMBER OF SITES] [CUTOFF]`
//!
//! Set `RUST_LOG=hwe=debug` to see which sites are re-tested exactly.
use std::process;
use std::time::Instant;

use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use hwe::{Fast, GenotypeCounts, Hwe, HweTest, DEFAULT_CUTOFF};

const SAMPLES: u64 = 2_000;

/// Mostly rare variants, some of them with a deficit or excess of heterozygotes
fn site(idx: u64) -> GenotypeCounts {
    let hom_minor = (idx * 7) % 11;
    let het = (idx * 13) % 97;
    GenotypeCounts::new(SAMPLES - het - hom_minor, het, hom_minor)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let sites: u64 = args
        .next()
        .map_or(Ok(100_000), |arg| arg.parse())
        .unwrap_or_else(|_| {
            eprintln!("the number of sites must be an integer");
            process::exit(1)
        });
    let cutoff: f64 = args
        .next()
        .map_or(Ok(DEFAULT_CUTOFF), |arg| arg.parse())
        .unwrap_or_else(|_| {
            eprintln!("the cutoff must be a number");
            process::exit(1)
        });

    let hwe = Hwe::new();
    let fast = match Fast::new(hwe.cache().clone(), cutoff) {
        Ok(fast) => fast,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1)
        }
    };

    let start = Instant::now();
    let results: Vec<(u64, GenotypeCounts, f64)> = (0..sites)
        .into_par_iter()
        .map(|idx| {
            let counts = site(idx);
            let pvalue = fast.pvalue(&counts).unwrap_or(f64::NAN);
            (idx, counts, pvalue)
        })
        .collect();
    let elapsed = start.elapsed();

    println!("site\tAA\tAa\taa\tmaf\tp_hwe");
    for (idx, counts, pvalue) in results.iter().take(20) {
        println!(
            "site_{}\t{}\t{}\t{}\t{:.4}\t{:.3e}",
            idx,
            counts.hom_major(),
            counts.het(),
            counts.hom_minor(),
            counts.minor_allele_frequency().unwrap_or(0.0),
            pvalue
        );
    }

    let significant = results.iter().filter(|(_, _, p)| *p < cutoff).count();
    let cache = hwe.cache();
    eprintln!(
        "{} sites in {:.2?}, {} below {:e}",
        sites, elapsed, significant, cutoff
    );
    eprintln!(
        "cache: {} exact ({} hits), {} approximate ({} hits), {} probabilities, {} factorials",
        cache.exact_stats().entries,
        cache.exact_stats().hits,
        cache.approximate_stats().entries,
        cache.approximate_stats().hits,
        cache.probability_stats().entries,
        cache.factorial_stats().entries,
    );
}
