//! Benchmarks for turning note spans into sorted step events.

use std::hint::black_box;

use clave_lock::sequencing::bridge::{to_step_events, NoteSpan};
use clave_lock::sequencing::grid::{ClavePattern, GridSpec, Resolution};
use clave_lock::sequencing::quantize::RoundingMode;
use criterion::{BenchmarkId, Criterion};

use crate::BATCH_SIZES;

pub fn bench_bridge(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid/bridge");
    let grid = GridSpec::new(96.0, Resolution::Sixteenth, ClavePattern::B).unwrap();

    for &size in BATCH_SIZES {
        // overlapping notes across channels so the sort has work to do
        let spans: Vec<NoteSpan> = (0..size)
            .map(|i| {
                NoteSpan::new((i as f64 * 0.3) % 8.0, 0.2 + (i % 4) as f64 * 0.25, 36 + (i % 24) as u8)
                    .with_channel((i % 3) as u8)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("to_step_events", size), &size, |b, _| {
            b.iter(|| black_box(to_step_events(black_box(&spans), &grid, RoundingMode::Nearest)))
        });
    }

    group.finish();
}
