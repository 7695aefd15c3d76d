use std::hint::black_box;

use chrono::Duration;
use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use ndarray::Array2;
use sharpe_rs::portfolio::AssetClassLimits;
use sharpe_rs::portfolio::AssetClassMembership;
use sharpe_rs::PortfolioOptimiser;
use sharpe_rs::PriceSeries;

const DAYS: usize = 756;

/// Trending prices with a per-asset periodic wobble.
fn universe(n_assets: usize) -> PriceSeries {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  let dates = (0..DAYS).map(|t| start + Duration::days(t as i64)).collect();
  let labels = (0..n_assets).map(|j| format!("ETF{j:02}")).collect();
  let closes = Array2::from_shape_fn((DAYS, n_assets), |(t, j)| {
    let period = (j % 7 + 2) as f64;
    let phase = (t as f64 / period * std::f64::consts::TAU).sin();
    100.0 + (0.05 + 0.01 * j as f64) * t as f64 + (0.5 + j as f64 * 0.3) * phase
  });
  PriceSeries::new(dates, labels, closes).unwrap()
}

fn classes(n_assets: usize) -> (AssetClassLimits, AssetClassMembership) {
  let mut limits = AssetClassLimits::new();
  let mut membership = AssetClassMembership::new();
  limits.insert("equity".into(), 0.6);
  limits.insert("bonds".into(), 0.5);
  membership.insert("equity".into(), (0..n_assets / 2).collect());
  membership.insert("bonds".into(), (n_assets / 2..n_assets).collect());
  (limits, membership)
}

fn bench_optimise(c: &mut Criterion) {
  let mut group = c.benchmark_group("Optimise");

  for n_assets in [5, 10, 20] {
    let optimiser = PortfolioOptimiser::new(universe(n_assets), 0.039).unwrap();
    let (limits, membership) = classes(n_assets);
    let cap = (2.0 / n_assets as f64).max(0.2);

    group.bench_with_input(BenchmarkId::new("box", n_assets), &n_assets, |b, _| {
      b.iter(|| {
        black_box(optimiser.optimise(
          &AssetClassLimits::new(),
          &AssetClassMembership::new(),
          cap,
          None,
        ))
      })
    });

    group.bench_with_input(BenchmarkId::new("classes", n_assets), &n_assets, |b, _| {
      b.iter(|| black_box(optimiser.optimise(&limits, &membership, cap, None)))
    });
  }

  group.finish();
}

fn bench_statistics(c: &mut Criterion) {
  let series = universe(20);
  c.bench_function("annualised statistics (20 assets)", |b| {
    b.iter(|| black_box(PortfolioOptimiser::new(series.clone(), 0.039)))
  });
}

criterion_group!(benches, bench_optimise, bench_statistics);
criterion_main!(benches);
