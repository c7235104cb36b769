//! Throughput Benchmark for sweepkv
//!
//! Measures liveness ingestion, count-based eviction, and store writes with
//! a deleter attached.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use sweepkv::deleter::{
    BoundedMaxHeap, Deleter, DeleterConfig, DeleterProvider, LivenessTable,
};
use sweepkv::storage::TtlStore;
use tokio::runtime::Runtime;

/// Deterministic scramble so timestamps arrive out of order.
fn scrambled(i: u64, n: u64) -> i64 {
    ((i.wrapping_mul(7919)) % n) as i64
}

fn populated_table(n: u64) -> LivenessTable<u64> {
    let mut table = LivenessTable::new();
    for i in 0..n {
        table.record(i, scrambled(i, n));
    }
    table
}

/// Benchmark folding events into the liveness table
fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(1));

    group.bench_function("table_record", |b| {
        let mut table = LivenessTable::new();
        let mut i = 0u64;
        b.iter(|| {
            table.record(black_box(i % 100_000), i as i64);
            i += 1;
        });
    });

    group.bench_function("deleter_record", |b| {
        let rt = Runtime::new().unwrap();
        let config = DeleterConfig::default()
            .with_sweep_interval(Duration::from_secs(3600))
            .with_buffer_size(1_000)
            .with_keep_num(50_000);
        let deleter = Arc::new(Deleter::<u64>::new("bench", config, None).unwrap());
        rt.block_on(async { deleter.start() }).unwrap();

        let mut i = 0u64;
        b.iter(|| {
            rt.block_on(deleter.record(i % 100_000, SystemTime::now()))
                .unwrap();
            i += 1;
        });

        rt.block_on(deleter.stop()).unwrap();
    });

    group.finish();
}

/// Benchmark count-based eviction against a full sort
fn bench_evict_excess(c: &mut Criterion) {
    let mut group = c.benchmark_group("evict_excess");
    let n = 100_000u64;
    group.throughput(Throughput::Elements(n));

    for keep in [50_000usize, 90_000] {
        group.bench_function(format!("heap_keep_{}", keep), |b| {
            b.iter_batched(
                || populated_table(n),
                |mut table| black_box(table.evict_excess(keep, |_| {})),
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("sort_baseline_keep_90000", |b| {
        b.iter_batched(
            || (0..n).map(|i| (scrambled(i, n), i)).collect::<Vec<_>>(),
            |mut entries| {
                entries.sort_unstable();
                entries.truncate(10_000);
                black_box(entries)
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("bounded_heap_k_10000", |b| {
        b.iter(|| {
            let mut heap = BoundedMaxHeap::new(10_000);
            for i in 0..n {
                heap.push(scrambled(i, n));
            }
            black_box(heap.len())
        });
    });

    group.finish();
}

/// Benchmark store writes that feed a running deleter
fn bench_store_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let provider = DeleterProvider::new(
        DeleterConfig::default()
            .with_sweep_interval(Duration::from_millis(100))
            .with_keep_num(50_000),
    )
    .unwrap();
    let store = TtlStore::<Bytes, Bytes, _>::with_deleter(&provider, "bench");
    rt.block_on(async { store.deleter().start() }).unwrap();

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_deleter", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(64));
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            rt.block_on(store.set(key, value.clone()));
            i += 1;
        });
    });

    group.finish();
    rt.block_on(store.deleter().stop()).unwrap();
}

criterion_group!(benches, bench_record, bench_evict_excess, bench_store_set);
criterion_main!(benches);
