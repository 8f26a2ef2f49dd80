//! # Scheduler Benchmark
//!
//! Work order computation over generated dependency matrices.
//!
//! Run with: `cargo bench --package tessera_core --bench schedule_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::system::schedule::{compute_schedule, find_cycle};
use tessera_core::{DependencyMatrix, SystemPriority};

/// Layered graph: every system depends on up to two systems of the previous
/// layer, every fifth system is isolated.
fn layered(size: usize) -> (DependencyMatrix, Vec<SystemPriority>) {
    let width = 8;
    let mut matrix = DependencyMatrix::with_size(size);
    for i in width..size {
        if i % 5 == 0 {
            continue;
        }
        matrix.set(i, i - width, true);
        if i % 3 == 0 {
            matrix.set(i, i - width + 1, true);
        }
    }

    let priorities = (0..size)
        .map(|i| SystemPriority((i % 7) as u16 * 50))
        .collect();
    (matrix, priorities)
}

fn bench_compute_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_schedule");

    for size in [16, 64, 256] {
        let (matrix, priorities) = layered(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(compute_schedule(&matrix, &priorities)));
        });
    }

    group.finish();
}

fn bench_find_cycle(c: &mut Criterion) {
    let (matrix, _) = layered(256);
    c.bench_function("find_cycle_256", |b| {
        b.iter(|| black_box(find_cycle(&matrix)));
    });
}

criterion_group!(benches, bench_compute_schedule, bench_find_cycle);
criterion_main!(benches);
