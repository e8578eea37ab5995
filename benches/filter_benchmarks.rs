//! Criterion benchmarks for the runtime filter subsystem.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the per-row cost of each filter kind's
//! insert/probe path and the cost of merging two producer-side
//! contributions together, the operations that sit on a hash join's
//! build and probe hot paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use runtime_filter::filter::types::ColumnValue;
use runtime_filter::filter::value::{
    BitmapPayload, BloomPayload, InOrBloomPayload, InSetPayload, MinMaxPayload, Polarity,
};

// ---------------------------------------------------------------------------
// Bloom
// ---------------------------------------------------------------------------

fn bench_bloom_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom_insert");
    for count in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut bloom = BloomPayload::new(1 << 20, 7).unwrap();
                for i in 0..n {
                    bloom.insert(&ColumnValue::Int64(i as i64));
                }
                black_box(bloom.estimated_false_positive_rate(n as usize));
            });
        });
    }
    group.finish();
}

fn bench_bloom_probe(c: &mut Criterion) {
    let mut bloom = BloomPayload::new(1 << 20, 7).unwrap();
    for i in 0..10_000i64 {
        bloom.insert(&ColumnValue::Int64(i));
    }
    c.bench_function("bloom_probe_10k", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i = (i + 1) % 20_000;
            black_box(bloom.probe(&ColumnValue::Int64(i)))
        });
    });
}

fn bench_bloom_merge(c: &mut Criterion) {
    let mut a = BloomPayload::new(1 << 20, 7).unwrap();
    let mut other = BloomPayload::new(1 << 20, 7).unwrap();
    for i in 0..10_000i64 {
        a.insert(&ColumnValue::Int64(i));
        other.insert(&ColumnValue::Int64(i + 10_000));
    }
    c.bench_function("bloom_merge_10k", |b| {
        b.iter(|| {
            let mut lhs = a.clone();
            lhs.merge(&other).unwrap();
            black_box(&lhs);
        });
    });
}

// ---------------------------------------------------------------------------
// In-set
// ---------------------------------------------------------------------------

fn bench_in_set_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_set_insert");
    for count in [100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut set = InSetPayload::new(4096);
                for i in 0..n {
                    set.insert(&ColumnValue::Int64(i as i64)).unwrap();
                }
                black_box(set.values().len());
            });
        });
    }
    group.finish();
}

fn bench_in_set_probe(c: &mut Criterion) {
    let mut set = InSetPayload::new(4096);
    for i in 0..1_000i64 {
        set.insert(&ColumnValue::Int64(i)).unwrap();
    }
    c.bench_function("in_set_probe_1k", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i = (i + 1) % 2_000;
            black_box(set.probe(&ColumnValue::Int64(i)))
        });
    });
}

// ---------------------------------------------------------------------------
// Min-max
// ---------------------------------------------------------------------------

fn bench_min_max_insert(c: &mut Criterion) {
    c.bench_function("min_max_insert_10k", |b| {
        b.iter(|| {
            let mut mm = MinMaxPayload::new();
            for i in 0..10_000i64 {
                mm.insert(&ColumnValue::Int64(i));
            }
            black_box(&mm);
        });
    });
}

// ---------------------------------------------------------------------------
// In-or-bloom
// ---------------------------------------------------------------------------

fn bench_in_or_bloom_promotion(c: &mut Criterion) {
    c.bench_function("in_or_bloom_promotes_past_capacity", |b| {
        b.iter(|| {
            let mut payload = InOrBloomPayload::new_set(256);
            for i in 0..10_000i64 {
                payload.insert(&ColumnValue::Int64(i), 1 << 20, 7).unwrap();
            }
            black_box(payload.is_bloom());
        });
    });
}

// ---------------------------------------------------------------------------
// Bitmap
// ---------------------------------------------------------------------------

fn bench_bitmap_insert_and_rle(c: &mut Criterion) {
    c.bench_function("bitmap_insert_and_runs_10k", |b| {
        b.iter(|| {
            let mut bitmap = BitmapPayload::new(Polarity::In);
            for i in 0..10_000i64 {
                bitmap.insert(&ColumnValue::Int64(i));
            }
            black_box(bitmap.runs().len());
        });
    });
}

criterion_group!(
    bloom_benches,
    bench_bloom_insert,
    bench_bloom_probe,
    bench_bloom_merge,
);

criterion_group!(in_set_benches, bench_in_set_insert, bench_in_set_probe);

criterion_group!(min_max_benches, bench_min_max_insert);

criterion_group!(in_or_bloom_benches, bench_in_or_bloom_promotion);

criterion_group!(bitmap_benches, bench_bitmap_insert_and_rle);

criterion_main!(
    bloom_benches,
    in_set_benches,
    min_max_benches,
    in_or_bloom_benches,
    bitmap_benches,
);
