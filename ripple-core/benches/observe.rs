//! Benchmarks for ripple-core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::reactive::{Computation, Owner, WatchOptions, WatchSource};
use ripple_core::{observe, ObjectRef, Value};

// =============================================================================
// OBSERVE BENCHMARKS
// =============================================================================

fn tree(width: usize) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = (0..width)
        .map(|i| serde_json::json!({ "id": i, "label": format!("row {}", i), "tags": ["a", "b"] }))
        .collect();
    serde_json::json!({ "rows": rows, "meta": { "total": width } })
}

fn bench_observe_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_tree");
    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let source = tree(width);
            b.iter(|| {
                let value = Value::from(source.clone());
                black_box(observe(&value, false))
            })
        });
    }
    group.finish();
}

// =============================================================================
// NOTIFY BENCHMARKS
// =============================================================================

fn bench_notify_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_fan_out");
    for subscribers in [1, 10, 100] {
        let owner = Owner::detached("bench");
        let data = ObjectRef::from_entries([("count", 0)]);
        observe(&Value::from(data.clone()), false);

        let _computations: Vec<Computation> = (0..subscribers)
            .map(|_| {
                let reader = data.clone();
                Computation::new(
                    &owner,
                    WatchSource::getter(move |_| Ok(reader.get("count"))),
                    None,
                    WatchOptions::default().sync(),
                )
                .unwrap()
            })
            .collect();

        let mut next = 0;
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            b.iter(|| {
                next += 1;
                data.set("count", black_box(next)).unwrap()
            })
        });
        owner.destroy();
    }
    group.finish();
}

fn bench_noop_write(c: &mut Criterion) {
    let owner = Owner::detached("bench");
    let data = ObjectRef::from_entries([("count", 42)]);
    observe(&Value::from(data.clone()), false);
    let reader = data.clone();
    let _computation = Computation::new(
        &owner,
        WatchSource::getter(move |_| Ok(reader.get("count"))),
        None,
        WatchOptions::default().sync(),
    )
    .unwrap();

    c.bench_function("noop_write", |b| b.iter(|| data.set("count", black_box(42)).unwrap()));
}

criterion_group!(benches, bench_observe_tree, bench_notify_fan_out, bench_noop_write);
criterion_main!(benches);
