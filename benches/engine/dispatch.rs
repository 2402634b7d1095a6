//! Benchmarks for one full cycle of scheduler polling.

use std::hint::black_box;
use std::time::Duration;

use clave_lock::engine::Scheduler;
use clave_lock::io::midi::MidiEvent;
use clave_lock::sequencing::bridge::{to_step_events, NoteSpan};
use clave_lock::sequencing::quantize::RoundingMode;
use clave_lock::RuntimeSpec;
use criterion::{BenchmarkId, Criterion};

use crate::BATCH_SIZES;

pub fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/dispatch");
    let spec = RuntimeSpec::builder(120.0).build().unwrap();
    let polls: Vec<Duration> = (0..4000).map(Duration::from_millis).collect();

    for &size in BATCH_SIZES {
        let spans: Vec<NoteSpan> = (0..size)
            .map(|i| NoteSpan::new((i as f64 * 0.25) % 8.0, 0.25, 36 + (i % 48) as u8))
            .collect();
        let pattern = to_step_events(&spans, &spec.grid, RoundingMode::Nearest);

        // 4000 polls at 1 ms cover one cycle at 120 BPM
        group.bench_with_input(BenchmarkId::new("cycle", size), &size, |b, _| {
            let mut sink: Vec<MidiEvent> = Vec::with_capacity(4096);
            b.iter(|| {
                let mut scheduler = Scheduler::new(&spec, pattern.clone(), Duration::ZERO);
                sink.clear();
                for &now in &polls {
                    scheduler.dispatch(now, &mut sink).unwrap();
                }
                black_box(sink.len())
            })
        });
    }

    group.finish();
}
