//! Criterion benchmarks over the runtime's hot paths: allocator tiers,
//! map probes, UTF-8 validation, and vector growth.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rtcore::alloc;
use rtcore::map::Map;
use rtcore::text;
use rtcore::vec::Vector;
use std::hint::black_box;

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

fn bench_alloc_free(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 65536];
    let mut group = c.benchmark_group("alloc_free");
    for &size in sizes {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let p = alloc::allocate(black_box(size));
                unsafe { alloc::free(p.as_ptr()) };
            })
        });
    }
    group.finish();
}

fn bench_alloc_churn(c: &mut Criterion) {
    c.bench_function("alloc_churn_mixed", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| {
            let mut live: Vec<(*mut u8, usize)> = Vec::with_capacity(64);
            for _ in 0..64 {
                let size = 16usize << rng.gen_range(0..8);
                live.push((alloc::allocate(size).as_ptr(), size));
                if live.len() > 32 {
                    let (p, _) = live.swap_remove(rng.gen_range(0..live.len()));
                    unsafe { alloc::free(p) };
                }
            }
            for (p, _) in live {
                unsafe { alloc::free(p) };
            }
        })
    });
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

fn bench_map_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert");
    for &n in &[1_000u64, 100_000] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut m: Map<u64, u64> = Map::new();
                for i in 0..n {
                    m.insert(i, i);
                }
                black_box(m.len())
            })
        });
    }
    group.finish();
}

fn bench_map_lookup(c: &mut Criterion) {
    let n = 100_000u64;
    let mut m: Map<u64, u64> = Map::new();
    for i in 0..n {
        m.insert(i, i * 3);
    }
    let mut group = c.benchmark_group("map_lookup");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 12_289) % n;
            black_box(m.get(&key))
        })
    });
    group.bench_function("miss", |b| {
        let mut key = n;
        b.iter(|| {
            key += 1;
            black_box(m.get(&key))
        })
    });
    group.finish();
}

fn bench_map_string_keys(c: &mut Criterion) {
    let keys: Vec<String> = (0..10_000).map(|i| format!("request-path-{i}")).collect();
    c.bench_function("map_insert_lookup_strings", |b| {
        b.iter(|| {
            let mut m: Map<&str, usize> = Map::new();
            for (i, k) in keys.iter().enumerate() {
                m.insert(k.as_str(), i);
            }
            let mut sum = 0usize;
            for k in &keys {
                sum += *m.get(&k.as_str()).unwrap();
            }
            black_box(sum)
        })
    });
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn bench_utf8_validate(c: &mut Criterion) {
    let ascii = "the quick brown fox jumps over the lazy dog ".repeat(512);
    let mixed = "héllo wörld 🌍 — μεικτό κείμενο ".repeat(512);
    let mut group = c.benchmark_group("utf8_validate");
    group.throughput(Throughput::Bytes(ascii.len() as u64));
    group.bench_function("ascii", |b| {
        b.iter(|| black_box(text::validate(black_box(ascii.as_bytes()))))
    });
    group.throughput(Throughput::Bytes(mixed.len() as u64));
    group.bench_function("mixed", |b| {
        b.iter(|| black_box(text::validate(black_box(mixed.as_bytes()))))
    });
    group.finish();
}

fn bench_utf8_transcode(c: &mut Criterion) {
    let mixed = "héllo wörld 🌍 ".repeat(256);
    c.bench_function("utf8_to_utf16", |b| {
        b.iter(|| black_box(text::utf8_to_utf16(black_box(mixed.as_bytes()))))
    });
}

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

fn bench_vector_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_push");
    for &n in &[1_000usize, 100_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut v: Vector<u64> = Vector::new();
                for i in 0..n as u64 {
                    v.push(i);
                }
                black_box(v.len())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free,
    bench_alloc_churn,
    bench_map_insert,
    bench_map_lookup,
    bench_map_string_keys,
    bench_utf8_validate,
    bench_utf8_transcode,
    bench_vector_push
);
criterion_main!(benches);
