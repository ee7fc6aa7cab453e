use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rxclaims::prelude::*;
use rxclaims::metrics::compute_metrics;
use rxclaims::quantity::common_quantities;
use rxclaims::recommendation::recommend_chains;
use std::hint::black_box;
use std::path::Path;
use tempfile::TempDir;

const CHAINS: &[&str] = &["health", "saver", "doctor", "discount", "corner"];

// Deterministic synthetic data: `pharmacies` NPIs, 50 drugs, every 7th claim reverted
fn synthetic(claims: usize, pharmacies: usize) -> (Vec<Claim>, Vec<Revert>, Vec<Pharmacy>) {
    let pharmacy_rows: Vec<Pharmacy> = (0..pharmacies)
        .map(|i| Pharmacy::new(format!("{}", 1_000_000 + i).as_str(), CHAINS[i % CHAINS.len()]))
        .collect();

    let claim_rows: Vec<Claim> = (0..claims)
        .map(|i| {
            // a few claims reference pharmacies outside the directory
            let npi = 1_000_000 + (i * 31) % (pharmacies + 3);
            Claim::new(
                format!("c{}", i),
                format!("{}", npi).as_str(),
                format!("{:011}", i % 50).as_str(),
                ((i * 17) % 1000) as f64 / 10.0,
                [30, 60, 90, 15, 120][i % 5],
            )
        })
        .collect();

    let reverts: Vec<Revert> = (0..claims)
        .step_by(7)
        .map(|i| Revert::new(format!("r{}", i), format!("c{}", i)))
        .collect();

    (claim_rows, reverts, pharmacy_rows)
}

fn benchmark_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("engines");

    for size in [1_000usize, 10_000, 100_000] {
        let (claims, reverts, pharmacies) = synthetic(size, 200);
        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies);

        group.bench_with_input(BenchmarkId::new("metrics", size), &size, |b, _| {
            b.iter(|| compute_metrics(black_box(&claims), black_box(&reverts), &eligible))
        });

        group.bench_with_input(BenchmarkId::new("recommendations", size), &size, |b, _| {
            b.iter(|| recommend_chains(black_box(&claims), black_box(&pharmacies), &eligible, 2))
        });

        group.bench_with_input(BenchmarkId::new("common_quantities", size), &size, |b, _| {
            b.iter(|| common_quantities(black_box(&claims), &eligible, 5))
        });

        group.bench_with_input(BenchmarkId::new("all_reports", size), &size, |b, _| {
            b.iter(|| ClaimsAnalytics::new(&claims, &reverts, &pharmacies, &eligible).reports())
        });
    }

    group.finish();
}

fn write_folder<T: serde::Serialize>(dir: &Path, name: &str, chunks: &[T]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), serde_json::to_string(chunks).unwrap()).unwrap();
}

fn benchmark_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("loading");
    group.sample_size(20);

    let temp = TempDir::new().unwrap();
    let (claims, reverts, pharmacies) = synthetic(50_000, 200);

    // split claims over several files so folder loading has work to parallelise
    for (idx, chunk) in claims.chunks(10_000).enumerate() {
        write_folder(&temp.path().join("claims"), &format!("claims_{}.json", idx), chunk);
    }
    write_folder(&temp.path().join("reverts"), "reverts.json", &reverts);

    let mut csv = String::from("chain,npi\n");
    for p in &pharmacies {
        csv.push_str(&format!("{},{}\n", p.chain, p.npi));
    }
    std::fs::create_dir_all(temp.path().join("pharmacies")).unwrap();
    std::fs::write(temp.path().join("pharmacies").join("pharmacies.csv"), csv).unwrap();

    group.bench_function("load_standard_50k_claims", |b| {
        b.iter(|| ClaimsDataset::load_standard(black_box(temp.path())).unwrap())
    });

    group.finish();
}

criterion_group!(benches, benchmark_engines, benchmark_loading);
criterion_main!(benches);
