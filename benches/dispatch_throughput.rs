//! Benchmarks for pool dispatch overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use thready::prelude::*;

fn registry() -> TaskRegistry {
    TaskRegistry::builder()
        .handler("noop", |v: Value, _| Ok::<_, String>(v))
        .handler("sum", |v: Value, _| {
            let n = v.as_u64().ok_or("expected an integer")?;
            Ok::<_, &str>(json!((0..n).sum::<u64>()))
        })
        .build()
        .expect("Failed to build registry")
}

fn pool(size: usize) -> Pool {
    let config = Config::builder()
        .pool_size(size)
        .build()
        .expect("Failed to build config");
    Pool::new(config, ThreadWorker::factory(registry())).expect("Failed to start pool")
}

fn bench_round_trip(c: &mut Criterion) {
    let pool = pool(1);

    c.bench_function("round_trip_noop", |b| {
        b.iter(|| pool.run("noop", black_box(json!(1))).wait().unwrap())
    });
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_of_1000");

    for size in [1, 2, 4, 8].iter() {
        let pool = pool(*size);

        group.bench_with_input(BenchmarkId::new("workers", size), size, |b, _| {
            b.iter(|| {
                let handles: Vec<_> = (0..1000).map(|_| pool.run("sum", json!(10_000))).collect();
                for handle in handles {
                    black_box(handle.wait().unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_round_trip, bench_batch);
criterion_main!(benches);
