//! Benchmarks for orderbook operations
//!
//! Run with: cargo bench --bench orderbook

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kraken_book::{compute_checksum, BookStore, ChecksumVerifier, Orderbook};
use kraken_types::{BookSide, Depth, RawLevel};

/// Create `count` wire records starting at `base`, stepping by `step`
fn create_records(base: i64, count: usize, step: i64, ts: &str) -> Vec<RawLevel> {
    (0..count as i64)
        .map(|i| {
            RawLevel::new(
                format!("{}.00000", base + step * i),
                format!("{}.{:08}", 1 + i / 10, (i * 37) % 100_000_000),
                ts,
            )
        })
        .collect()
}

fn synced_store(depth: Depth) -> BookStore {
    let n = depth.levels();
    let mut store = BookStore::new(depth);
    store
        .initialize_from_snapshot(
            &create_records(100_000, n, -1, "1.0"),
            &create_records(100_001, n, 1, "1.0"),
        )
        .unwrap();
    store
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_snapshot");

    for depth in [Depth::D10, Depth::D100, Depth::D1000] {
        let n = depth.levels();
        group.throughput(Throughput::Elements((n * 2) as u64)); // Both sides

        let bids = create_records(100_000, n, -1, "1.0");
        let asks = create_records(100_001, n, 1, "1.0");

        group.bench_with_input(BenchmarkId::from_parameter(n), &(bids, asks), |b, (bids, asks)| {
            b.iter(|| {
                let mut store = BookStore::new(depth);
                let result = store.initialize_from_snapshot(black_box(bids), black_box(asks));
                black_box(result)
            })
        });
    }

    group.finish();
}

fn bench_apply_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_apply_updates");

    for batch in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(batch as u64));
        let records = create_records(99_995, batch, 1, "2.0");

        group.bench_with_input(BenchmarkId::from_parameter(batch), &records, |b, records| {
            b.iter_batched(
                || synced_store(Depth::D100),
                |mut store| {
                    let result = store.apply_updates(BookSide::Bid, black_box(records), "0");
                    black_box(result)
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let store = synced_store(Depth::D100);

    c.bench_function("checksum_compute", |b| {
        b.iter(|| {
            let result = compute_checksum(
                store.top_levels(BookSide::Ask, 10),
                store.top_levels(BookSide::Bid, 10),
            );
            black_box(result)
        })
    });

    c.bench_function("checksum_verify", |b| {
        b.iter(|| {
            let result = ChecksumVerifier::verify(black_box(&store), "974947235");
            black_box(result)
        })
    });
}

fn bench_orderbook_update_cycle(c: &mut Criterion) {
    let bids = create_records(100_000, 10, -1, "1.0");
    let asks = create_records(100_001, 10, 1, "1.0");
    let update = vec![RawLevel::new("100000.00000", "2.50000000", "2.0")];

    let mut expected = synced_store(Depth::D10);
    expected.apply_batch(BookSide::Bid, &update).unwrap();
    let checksum = ChecksumVerifier::verify(&expected, "").computed_checksum;

    c.bench_function("orderbook_update_cycle", |b| {
        b.iter_batched(
            || {
                let mut book = Orderbook::new("XBT/USD", Depth::D10);
                book.on_snapshot(&bids, &asks).unwrap();
                book
            },
            |mut book| {
                let result = book.on_update(BookSide::Bid, black_box(&update), &checksum);
                black_box(result)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_orderbook_snapshot(c: &mut Criterion) {
    let mut book = Orderbook::new("XBT/USD", Depth::D100);
    book.on_snapshot(
        &create_records(100_000, 100, -1, "1.0"),
        &create_records(100_001, 100, 1, "1.0"),
    )
    .unwrap();

    c.bench_function("orderbook_snapshot_capture", |b| {
        b.iter(|| {
            let result = book.snapshot();
            black_box(result)
        })
    });
}

criterion_group!(
    benches,
    bench_snapshot,
    bench_apply_updates,
    bench_checksum,
    bench_orderbook_update_cycle,
    bench_orderbook_snapshot,
);

criterion_main!(benches);
