//! Performance benchmarks for settee-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use settee_engine::memory::store::Store;
use settee_engine::memory::MemoryDriver;
use settee_engine::{AllDocsQuery, CancellationToken, Options, Registry, RevTree, RevisionId};
use std::sync::Arc;

fn populated_store(size: usize) -> Store {
    let mut store = Store::new();
    for i in 0..size {
        let _ = store.put(
            &format!("user_{i:06}"),
            json!({"name": format!("User {i}"), "age": i % 90}),
            None,
        );
    }
    store
}

fn bench_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_operations");

    group.bench_function("put_new", |b| {
        let mut store = Store::new();
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            store.put(
                black_box(&format!("user_{id}")),
                black_box(json!({"name": "Test User"})),
                None,
            )
        })
    });

    group.bench_function("put_update", |b| {
        let mut store = Store::new();
        let mut rev = store.put("user", json!({"n": 0}), None).ok();
        let mut n = 0u64;

        b.iter(|| {
            n += 1;
            rev = store.put("user", json!({"n": n}), rev.as_ref()).ok();
        })
    });

    group.bench_function("get_winner", |b| {
        let store = populated_store(1000);
        b.iter(|| store.get(black_box("user_000500"), None, false))
    });

    group.finish();
}

fn bench_all_docs(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_docs");

    for size in [100, 1000, 10_000].iter() {
        let store = populated_store(*size);

        group.bench_with_input(BenchmarkId::new("full_scan", size), size, |b, _| {
            let query = AllDocsQuery::default();
            b.iter(|| store.all_docs(black_box(&query)).count())
        });

        group.bench_with_input(BenchmarkId::new("page_of_50", size), size, |b, _| {
            let options = Options::new()
                .with("startkey", "user_000050")
                .with("limit", 50)
                .with("include_docs", true);
            let query = AllDocsQuery::from_options(&options).unwrap();
            b.iter(|| store.all_docs(black_box(&query)).count())
        });
    }

    group.finish();
}

fn bench_revisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("revisions");

    group.bench_function("compute_id", |b| {
        let parent = RevisionId::new(3, "0123456789abcdef0123456789abcdef");
        let body = json!({
            "name": "Alice",
            "tags": ["a", "b", "c"],
            "address": {"city": "Lisbon", "zip": "1000-001"}
        });
        b.iter(|| RevisionId::compute(black_box(Some(&parent)), false, black_box(&body)).unwrap())
    });

    for branches in [2usize, 16, 64].iter() {
        group.bench_with_input(
            BenchmarkId::new("graft_branches", branches),
            branches,
            |b, &branches| {
                b.iter(|| {
                    let mut tree = RevTree::new();
                    let root = RevisionId::new(1, "root");
                    for i in 0..branches {
                        let history = vec![RevisionId::new(2, format!("{i:032x}")), root.clone()];
                        let _ = tree.graft(&history, false, json!({"branch": i}));
                    }
                    tree.winner().cloned()
                })
            },
        );
    }

    group.finish();
}

fn bench_memory_driver(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_driver");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let db = rt.block_on(async {
        let registry = Registry::new();
        registry.register("memory", Arc::new(MemoryDriver));
        let client = registry.new_client(&cancel, "memory", "").await.unwrap();
        client.create_db(&cancel, "bench", &Options::new()).await.unwrap();
        client.db(&cancel, "bench", &Options::new()).await.unwrap()
    });

    group.bench_function("put_through_facade", |b| {
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            rt.block_on(db.put(
                &cancel,
                &format!("doc_{id}"),
                json!({"n": id}),
                None,
                &Options::new(),
            ))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_operations,
    bench_all_docs,
    bench_revisions,
    bench_memory_driver
);
criterion_main!(benches);
