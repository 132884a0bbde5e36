//! Criterion benchmarks for the scoring hot paths.
//!
//! Benchmarks:
//! 1. Metric extraction over an S&P 500-sized batch of attribute bags
//! 2. Full ranking pass (imputation, percentiles, score, sort)
//! 3. Percentile ranks for a single column

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use rvscreen_core::data::RawAttributes;
use rvscreen_core::domain::MetricRow;
use rvscreen_core::rank::{percentile_ranks, rank, ScoreOrder};
use rvscreen_core::extract_metrics;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bags(n: usize) -> Vec<(String, RawAttributes)> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let bag = json!({
                "currentPrice": 20.0 + (x * 0.37).sin().abs() * 400.0,
                "trailingPE": if i % 17 == 0 { json!("N/A") } else { json!(5.0 + (x * 0.11).cos().abs() * 40.0) },
                "priceToBook": 0.5 + (x * 0.23).sin().abs() * 12.0,
                "priceToSalesTrailing12Months": 0.3 + (x * 0.19).cos().abs() * 9.0,
                "enterpriseValue": 1e9 + x * 3.1e7,
                "ebitda": if i % 11 == 0 { json!(0) } else { json!(1e8 + x * 1.3e6) },
                "grossMargins": 0.2 + (x * 0.05).sin().abs() * 0.5,
                "totalRevenue": 5e8 + x * 2.2e6,
            });
            let serde_json::Value::Object(map) = bag else {
                unreachable!()
            };
            (format!("T{i:04}"), map)
        })
        .collect()
}

fn make_rows(n: usize) -> Vec<MetricRow> {
    make_bags(n)
        .iter()
        .map(|(symbol, bag)| extract_metrics(symbol, bag))
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_extract(c: &mut Criterion) {
    let bags = make_bags(505);
    c.bench_function("extract_505", |b| {
        b.iter(|| {
            for (symbol, bag) in &bags {
                black_box(extract_metrics(symbol, bag));
            }
        })
    });
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    for n in [100usize, 505, 3_000] {
        let rows = make_rows(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| black_box(rank(rows, ScoreOrder::HighestFirst)))
        });
    }
    group.finish();
}

fn bench_percentiles(c: &mut Criterion) {
    let column: Vec<f64> = (0..5_000).map(|i| ((i * 7919) % 1013) as f64).collect();
    c.bench_function("percentile_ranks_5000", |b| {
        b.iter(|| black_box(percentile_ranks(&column)))
    });
}

criterion_group!(benches, bench_extract, bench_rank, bench_percentiles);
criterion_main!(benches);
