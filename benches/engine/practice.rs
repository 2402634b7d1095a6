//! Benchmarks for practice lock decisions.

use std::hint::black_box;
use std::time::Duration;

use clave_lock::engine::PracticeLock;
use clave_lock::io::midi::{MidiEvent, TimedEvent};
use clave_lock::RuntimeSpec;
use criterion::{BenchmarkId, Criterion};

use crate::BATCH_SIZES;

pub fn bench_practice(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/practice");
    let spec = RuntimeSpec::builder(120.0).window_ms(20.0).build().unwrap();

    for &size in BATCH_SIZES {
        // alternating onsets and releases at uneven times
        let events: Vec<TimedEvent> = (0..size)
            .map(|i| {
                let at = Duration::from_micros(i as u64 * 61_337);
                let key = 60 + (i / 2 % 12) as u8;
                let event = if i % 2 == 0 {
                    MidiEvent::NoteOn {
                        channel: 0,
                        key,
                        velocity: 100,
                    }
                } else {
                    MidiEvent::NoteOff {
                        channel: 0,
                        key,
                        velocity: 0,
                    }
                };
                TimedEvent::new(at, event)
            })
            .collect();

        // pure classification
        let lock = PracticeLock::new(&spec);
        group.bench_with_input(BenchmarkId::new("decide", size), &size, |b, _| {
            b.iter(|| {
                for e in &events {
                    black_box(lock.decide(black_box(&e.event), e.at, Duration::ZERO));
                }
            })
        });

        // classification plus scheduling and the final flush
        group.bench_with_input(BenchmarkId::new("ingest", size), &size, |b, _| {
            let mut sink: Vec<MidiEvent> = Vec::with_capacity(size * 2);
            b.iter(|| {
                let mut lock = PracticeLock::new(&spec);
                sink.clear();
                for e in &events {
                    lock.ingest(*e, Duration::ZERO, e.at, &mut sink).unwrap();
                }
                lock.flush_due(Duration::MAX, &mut sink).unwrap();
                black_box(sink.len())
            })
        });
    }

    group.finish();
}
