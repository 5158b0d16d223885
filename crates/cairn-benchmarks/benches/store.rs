//! Store persist and get benchmarks
//!
//! Measures the cold write path through each backend, the warm cache path
//! and backend reads with the cache disabled.

use cairn_benchmarks::{create_test_content, criterion_config, runtime};
use cairn_store::{
    CachePolicy, FileStorage, MemoryStorage, Persisted, Storage, Store, StoreResultCache,
};
use camino::Utf8PathBuf;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::tempdir;

fn file_backend(temp_dir: &tempfile::TempDir) -> Arc<dyn Storage> {
    let root = Utf8PathBuf::from_path_buf(temp_dir.path().join("store")).unwrap();
    Arc::new(FileStorage::new(root).unwrap())
}

/// Benchmark first-time persists of distinct payloads
fn bench_persist(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("store_persist");
    group.measurement_time(std::time::Duration::from_secs(10));

    for size in [1024, 10_240, 102_400].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        let temp_dir = tempdir().unwrap();
        let file_store = Store::new(file_backend(&temp_dir));
        let memory_store = Store::new(Arc::new(MemoryStorage::new()));
        let content = create_test_content(*size);

        for (label, store) in [("file", &file_store), ("memory", &memory_store)] {
            group.bench_with_input(BenchmarkId::new(label, size), &content, |b, data| {
                let mut counter = 0u64;

                b.iter(|| {
                    counter += 1;
                    let value = (counter, data.clone());
                    black_box(rt.block_on(store.persist(value)).unwrap())
                });
            });
        }
    }

    group.finish();
}

/// Benchmark repeat persists answered by the result cache
fn bench_persist_cached(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("store_persist_cached");

    let store = Store::new(Arc::new(MemoryStorage::new()));
    let value = "StringsAreImmutable".to_string();
    rt.block_on(store.persist(value.clone())).unwrap();

    group.bench_function("string", |b| {
        b.iter(|| black_box(rt.block_on(store.persist(value.clone())).unwrap()));
    });

    group.finish();
}

/// Benchmark gets with and without the result cache
fn bench_get(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("store_get");

    for size in [1024, 10_240, 102_400].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        let temp_dir = tempdir().unwrap();
        let backend = file_backend(&temp_dir);
        let cached = Store::new(Arc::clone(&backend));
        let uncached = Store::builder()
            .backend(backend)
            .cache(Arc::new(StoreResultCache::with_policy(CachePolicy::disabled())))
            .build()
            .unwrap();

        let content = create_test_content(*size);
        let checksum = rt
            .block_on(cached.persist(content))
            .unwrap()
            .checksum()
            .clone();

        group.bench_with_input(BenchmarkId::new("cached", size), &checksum, |b, checksum| {
            b.iter(|| {
                let persisted: Persisted<Vec<u8>> = rt.block_on(cached.get(checksum)).unwrap();
                black_box(persisted)
            });
        });

        group.bench_with_input(BenchmarkId::new("file", size), &checksum, |b, checksum| {
            b.iter(|| {
                let persisted: Persisted<Vec<u8>> = rt.block_on(uncached.get(checksum)).unwrap();
                black_box(persisted)
            });
        });
    }

    group.finish();
}

/// Benchmark fan-out cost as backends are added
fn bench_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("store_fan_out");

    for backend_count in [1, 2, 4].iter() {
        let backends: Vec<Arc<dyn Storage>> = (0..*backend_count)
            .map(|_| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>)
            .collect();
        let store = Store::with_backends(backends).unwrap();

        group.bench_with_input(
            BenchmarkId::new("backends", backend_count),
            backend_count,
            |b, _| {
                let mut counter = 0u64;

                b.iter(|| {
                    counter += 1;
                    black_box(rt.block_on(store.persist(counter)).unwrap())
                });
            },
        );
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_persist, bench_persist_cached, bench_get, bench_fan_out
}
criterion_main!(benches);
