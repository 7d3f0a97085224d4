//! Performance benchmarks for merging and filtering.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livefeed::{apply, merge, FeedConfig, FilterEngine, FilterSpec, OrderedSet, RawRecord, SnapshotEvent};
use serde_json::json;

const CITIES: [&str; 4] = ["Istanbul", "Ankara", "Izmir", "Bursa"];
const CATEGORIES: [&str; 5] = ["driver", "waiter", "cashier", "courier", "sales"];

fn listing(i: usize) -> RawRecord {
    RawRecord::new(
        format!("job{:06}", i),
        json!({
            "createdAt": i as i64,
            "title": format!("{} wanted #{}", CATEGORIES[i % CATEGORIES.len()], i),
            "description": "Full time, flexible hours",
            "company": format!("Company {}", i % 97),
            "category": CATEGORIES[i % CATEGORIES.len()],
            "location": CITIES[i % CITIES.len()],
        }),
    )
}

fn loaded_set(size: usize, config: &FeedConfig) -> OrderedSet {
    let event = SnapshotEvent::full((0..size).map(listing).collect());
    merge(&OrderedSet::new(), &event, config).set
}

/// Full snapshot replace at varying collection sizes
fn bench_full_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_snapshot");
    let config = FeedConfig::default();

    for size in [100, 1_000, 10_000] {
        let event = SnapshotEvent::full((0..size).map(listing).collect());
        group.bench_with_input(BenchmarkId::new("records", size), &event, |b, event| {
            b.iter(|| black_box(merge(&OrderedSet::new(), event, &config)));
        });
    }

    group.finish();
}

/// Incremental upserts landing at the head, middle and tail
fn bench_incremental_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_upsert");
    let config = FeedConfig::default();
    let base = loaded_set(10_000, &config);

    for (name, ts) in [("head", 20_000i64), ("middle", 5_000), ("tail", -1)] {
        let event = SnapshotEvent::upsert(RawRecord::new(
            "incoming",
            json!({"createdAt": ts, "title": "incoming"}),
        ));
        group.bench_function(name, |b| {
            b.iter_batched(
                || base.clone(),
                |mut set| black_box(apply(&mut set, &event, &config)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Strict and relaxed filter passes over a loaded set
fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let config = FeedConfig::default();
    let set = loaded_set(10_000, &config);
    let engine = FilterEngine::from_config(&config);

    let specs = [
        ("category", FilterSpec::new().with_category("driver")),
        ("city_strict", FilterSpec::new().with_city("ankara").with_category("waiter")),
        ("city_relaxed", FilterSpec::new().with_city("Antalya").with_category("sales")),
        ("search", FilterSpec::new().with_search_term("company 42")),
    ];

    for (name, spec) in specs {
        group.bench_function(name, |b| {
            b.iter(|| black_box(engine.evaluate(set.as_slice(), &spec)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_snapshot,
    bench_incremental_upsert,
    bench_filter,
);
criterion_main!(benches);
