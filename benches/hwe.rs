use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rayon::prelude::*;

use hwe::chisquare::approximate;
use hwe::exact::exact;
use hwe::rescaled::snphwe;
use hwe::{GenotypeCounts, Hwe, HweCache};

const COMMON: GenotypeCounts = GenotypeCounts::new(1_200, 2_400, 1_400);
const RARE: GenotypeCounts = GenotypeCounts::new(4_950, 40, 10);

fn sites(times: u64) -> Vec<GenotypeCounts> {
    (0..times)
        .map(|idx| {
            let hom_minor = (idx * 7) % 11;
            let het = (idx * 13) % 97;
            GenotypeCounts::new(2_000 - het - hom_minor, het, hom_minor)
        })
        .collect()
}

fn scan_sequential(hwe: &Hwe, sites: &[GenotypeCounts]) -> usize {
    let mut count = 0usize;
    for counts in sites {
        if hwe.fast(counts).unwrap() < 1e-6 {
            count += 1;
        }
    }
    count
}

fn scan_parallel(hwe: &Hwe, sites: &[GenotypeCounts]) -> usize {
    sites
        .par_iter()
        .filter(|counts| hwe.fast(counts).unwrap() < 1e-6)
        .count()
}

fn single_site_benchmark(c: &mut Criterion) {
    for (name, counts) in [("common", COMMON), ("rare", RARE)] {
        c.bench_function(&format!("chisquare {name}"), |b| {
            b.iter(|| approximate(black_box(&counts)))
        });

        c.bench_function(&format!("exact uncached {name}"), |b| {
            b.iter(|| exact(&HweCache::new(), black_box(&counts)))
        });

        let cache = HweCache::new();
        c.bench_function(&format!("exact cached {name}"), |b| {
            b.iter(|| exact(&cache, black_box(&counts)))
        });

        c.bench_function(&format!("rescaled {name}"), |b| {
            b.iter(|| snphwe(black_box(&counts)))
        });
    }
}

fn scan_benchmark(c: &mut Criterion) {
    let sites = sites(10_000);

    c.bench_function("fast-scan 10000", |b| {
        b.iter(|| scan_sequential(black_box(&Hwe::new()), black_box(&sites)))
    });

    c.bench_function("fast-scan-parallel 10000", |b| {
        b.iter(|| scan_parallel(black_box(&Hwe::new()), black_box(&sites)))
    });
}

criterion_group!(hardy_weinberg, single_site_benchmark, scan_benchmark);
criterion_main!(hardy_weinberg);
