//! Benchmarks for rounding and nearest-hit lookup.

use std::hint::black_box;

use clave_lock::sequencing::grid::{ClavePattern, GridSpec, Resolution};
use clave_lock::sequencing::quantize::{nearest_hit, quantize, RoundingMode};
use criterion::{BenchmarkId, Criterion};

use crate::BATCH_SIZES;

pub fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid/quantize");
    let grid = GridSpec::new(120.0, Resolution::Sixteenth, ClavePattern::A).unwrap();
    let steps = grid.steps_per_cycle();
    let hits = grid.hit_table();

    for &size in BATCH_SIZES {
        // spread positions over the whole cycle, off the grid
        let positions: Vec<f64> = (0..size)
            .map(|i| (i as f64 * 0.37) % steps as f64)
            .collect();

        group.bench_with_input(BenchmarkId::new("nearest", size), &size, |b, _| {
            b.iter(|| {
                for &p in &positions {
                    black_box(quantize(black_box(p), steps, RoundingMode::Nearest));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("nearest_hit", size), &size, |b, _| {
            b.iter(|| {
                for &p in &positions {
                    black_box(nearest_hit(black_box(p), &hits, steps));
                }
            })
        });
    }

    group.finish();
}
