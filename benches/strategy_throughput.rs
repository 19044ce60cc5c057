//! Throughput of the convergence strategies over a relaxing transient

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use steadyrun::analysis::{build_detector, registry, ConvergenceCondition, ConvergenceParams};

/// Exponential relaxation with a small ripple
fn generate_transient(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| {
            let t = i as f64;
            1.0 - (-t / 20_000.0).exp() + 1e-4 * (t * 0.3).sin()
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_feed");

    for &size in &[10_000usize, 100_000] {
        let samples = generate_transient(size);
        group.throughput(Throughput::Elements(size as u64));

        for name in registry().keys() {
            let params = ConvergenceParams {
                strategy: name.to_string(),
                ..ConvergenceParams::default()
            };
            group.bench_with_input(BenchmarkId::new(*name, size), &samples, |b, samples| {
                b.iter(|| {
                    let Some(mut detector) = build_detector(&params, 1e-3).unwrap() else {
                        return;
                    };
                    for &sample in samples {
                        black_box(detector.feed(sample));
                    }
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
