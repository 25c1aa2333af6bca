//! Benchmarks for chart pattern analysis.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chartpat::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
  o: f64,
  h: f64,
  l: f64,
  c: f64,
  v: f64,
}

impl OHLCV for TestBar {
  fn open(&self) -> f64 {
    self.o
  }

  fn high(&self) -> f64 {
    self.h
  }

  fn low(&self) -> f64 {
    self.l
  }

  fn close(&self) -> f64 {
    self.c
  }

  fn volume(&self) -> f64 {
    self.v
  }
}

/// Deterministic oscillating series with swings wide enough to form extrema
fn generate_bars(n: usize) -> Vec<TestBar> {
  let mut bars = Vec::with_capacity(n);
  let mut prev = 100.0;

  for i in 0..n {
    let x = i as f64;
    let wave = 8.0 * (x / 17.0).sin() + 3.0 * (x / 5.0).sin();
    let noise = ((i * 7 + 13) % 100) as f64 / 100.0 - 0.5;

    let o = prev;
    let c = 100.0 + wave + noise;
    let h = o.max(c) + 0.4;
    let l = o.min(c) - 0.4;
    let v = 1000.0 + ((i * 31) % 500) as f64;

    bars.push(TestBar { o, h, l, c, v });
    prev = c;
  }

  bars
}

fn bench_single_detector(c: &mut Criterion) {
  let bars = generate_bars(500);

  let engine = EngineBuilder::new()
    .add(BuiltinDetector::DoubleTop(DoubleTopDetector::with_defaults()))
    .build()
    .unwrap();

  c.bench_function("analyze_double_top_500_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze(black_box(&bars)));
    })
  });
}

fn bench_all_detectors(c: &mut Criterion) {
  let bars = generate_bars(500);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("analyze_all_patterns_500_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze(black_box(&bars)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("analyze", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.analyze(black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let bars1 = generate_bars(500);
  let bars2 = generate_bars(600);
  let bars3 = generate_bars(700);
  let bars4 = generate_bars(800);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let instruments: Vec<(&str, &[TestBar])> =
    vec![("SYM1", &bars1), ("SYM2", &bars2), ("SYM3", &bars3), ("SYM4", &bars4)];

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), black_box(instruments.clone())));
    })
  });
}

fn bench_context_computation(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("compute_context_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.compute_context(black_box(&bars)));
    })
  });
}

fn bench_analyze_with_context(c: &mut Criterion) {
  let bars = generate_bars(1000);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  let ctx = engine.compute_context(&bars);

  c.bench_function("analyze_with_context_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.analyze_with_context(black_box(&bars), black_box(&ctx)));
    })
  });
}

criterion_group!(
  benches,
  bench_single_detector,
  bench_all_detectors,
  bench_scaling,
  bench_parallel_scan,
  bench_context_computation,
  bench_analyze_with_context,
);

criterion_main!(benches);
