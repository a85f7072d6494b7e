//! Store Performance Benchmarks
//!
//! - State updates: merge + deep freeze + publish, with and without observers
//! - Deep freeze over shared node graphs
//! - Tracked action overhead
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use signal_store_core::{Shared, deep_freeze};
use signal_store_runtime::{Store, StoreBuilder};

fn json_store(runtime: &tokio::runtime::Runtime) -> Store<Value> {
    let _guard = runtime.enter();
    StoreBuilder::from_state(json!({ "count": 0, "items": (0..100).collect::<Vec<_>>() }))
        .with_loader(|()| async { Ok(json!({})) })
        .build()
        .expect("Failed to build factory")
        .create(())
        .expect("Failed to create store")
}

fn benchmark_update_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_state");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("no_observers", |b| {
        let store = json_store(&runtime);
        let mut count = 0_u64;
        b.iter(|| {
            count += 1;
            store.update_state(black_box(json!({ "count": count })));
        });
    });

    group.bench_function("with_selector_observers", |b| {
        let store = json_store(&runtime);
        let derived: Vec<_> = (0..10)
            .map(|_| store.derive(|state| state["count"].as_u64().unwrap_or_default()))
            .collect();
        let mut count = 0_u64;
        b.iter(|| {
            count += 1;
            store.update_state(black_box(json!({ "count": count })));
        });
        drop(derived);
    });

    group.finish();
}

fn benchmark_deep_freeze(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_freeze");

    for size in [10_usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("shared_nodes", size), &size, |b, &size| {
            b.iter_with_setup(
                || (0..size).map(|i| Shared::new(i.to_string())).collect::<Vec<_>>(),
                |nodes| black_box(deep_freeze(&nodes)),
            );
        });
    }

    group.finish();
}

fn benchmark_tracked_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked_action");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("run_action", |b| {
        let store = json_store(&runtime);
        b.to_async(&runtime).iter(|| async {
            let _ = store
                .run_action("noop", Value::Null, async { Ok::<_, anyhow::Error>(()) })
                .await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_update_state,
    benchmark_deep_freeze,
    benchmark_tracked_action,
);
criterion_main!(benches);
