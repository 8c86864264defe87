//! Criterion micro-benchmarks for runtime heap allocation paths.

use std::hint::black_box;
use std::ptr::NonNull;

use bplus_bench::{heap_profile, SIZE_MIX};
use bplus_ffi::alloc::{bplus_alloc, bplus_free};
use criterion::{criterion_group, criterion_main, Criterion};

/// Benchmark: one alloc + free of 64 bytes per heap configuration.
fn bench_alloc_free_64(c: &mut Criterion) {
    for (name, heap) in heap_profile() {
        c.bench_function(&format!("alloc_free_64/{name}"), |b| {
            b.iter(|| {
                let p = heap.alloc(black_box(64)).unwrap();
                unsafe { heap.free(p).unwrap() };
            });
        });
    }
}

/// Benchmark: hold 256 blocks from the size mix, then release them all.
fn bench_churn_256(c: &mut Criterion) {
    for (name, heap) in heap_profile() {
        let mut held: Vec<NonNull<u8>> = Vec::with_capacity(256);
        c.bench_function(&format!("churn_256/{name}"), |b| {
            b.iter(|| {
                for i in 0..256 {
                    held.push(heap.alloc(SIZE_MIX[i % SIZE_MIX.len()]).unwrap());
                }
                for p in held.drain(..) {
                    unsafe { heap.free(p).unwrap() };
                }
            });
        });
    }
}

/// Benchmark: grow one block from 16 bytes to 64KB by doubling.
fn bench_realloc_doubling(c: &mut Criterion) {
    for (name, heap) in heap_profile() {
        c.bench_function(&format!("realloc_doubling/{name}"), |b| {
            b.iter(|| {
                let mut p = heap.alloc(16).unwrap();
                let mut size = 16;
                while size < 65536 {
                    size *= 2;
                    p = unsafe { heap.realloc(p, size).unwrap() };
                }
                unsafe { heap.free(black_box(p)).unwrap() };
            });
        });
    }
}

/// Benchmark: the exported C pair, including the panic guard.
fn bench_ffi_pair(c: &mut Criterion) {
    c.bench_function("ffi_alloc_free_64", |b| {
        b.iter(|| {
            let p = bplus_alloc(black_box(64));
            bplus_free(black_box(p));
        });
    });
}

criterion_group!(
    benches,
    bench_alloc_free_64,
    bench_churn_256,
    bench_realloc_doubling,
    bench_ffi_pair
);
criterion_main!(benches);
