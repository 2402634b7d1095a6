/*
Step-Event Bridge
=================

Pattern producers describe notes in beats. The schedulers work in steps of a
single cycle. This module converts one into the other.

Each note becomes an onset and a release. Both positions are divided by
beats-per-step, rounded with the session's rounding mode and wrapped into the
cycle, so the same note always lands on the same steps the practice quantizer
would choose.

Two rules keep notes from sticking:
- A release that rounds onto its own onset step moves to the next step.
- Events on the same step are ordered releases first, then onsets, then
  control messages; ties break by channel then key.
*/

use crate::io::midi::MidiEvent;
use crate::sequencing::grid::GridSpec;
use crate::sequencing::quantize::{quantize, RoundingMode};

/// A note positioned in musical time
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteSpan {
    /// Start, in beats from the top of the cycle
    pub start_beat: f64,
    /// Length in beats
    pub duration_beats: f64,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
}

impl NoteSpan {
    pub fn new(start_beat: f64, duration_beats: f64, key: u8) -> Self {
        Self {
            start_beat,
            duration_beats,
            channel: 0,
            key,
            velocity: 100,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }
}

/// A message pinned to a step of the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub step: u32,
    pub event: MidiEvent,
}

impl StepEvent {
    pub fn new(step: u32, event: MidiEvent) -> Self {
        Self { step, event }
    }
}

/// Convert beat-timed notes into sorted, cycle-relative step events
pub fn to_step_events(spans: &[NoteSpan], grid: &GridSpec, mode: RoundingMode) -> Vec<StepEvent> {
    let steps = grid.steps_per_cycle();
    let beats_per_step = grid.beats_per_step();

    let mut events = Vec::with_capacity(spans.len() * 2);

    for span in spans {
        let onset = quantize(span.start_beat / beats_per_step, steps, mode);
        let end_beat = span.start_beat + span.duration_beats.max(0.0);
        let mut release = quantize(end_beat / beats_per_step, steps, mode);

        if release == onset {
            release = (onset + 1) % steps;
        }

        events.push(StepEvent::new(
            onset,
            MidiEvent::NoteOn {
                channel: span.channel,
                key: span.key,
                // velocity 0 would read as a release
                velocity: span.velocity.max(1),
            },
        ));
        events.push(StepEvent::new(
            release,
            MidiEvent::NoteOff {
                channel: span.channel,
                key: span.key,
                velocity: 0,
            },
        ));
    }

    sort_step_events(&mut events);
    events
}

/// Deterministic send order: step, then releases before onsets, then
/// channel and key
pub fn sort_step_events(events: &mut [StepEvent]) {
    events.sort_by_key(|e| (e.step, e.event.order_key()));
}

/// One step-long click on every clave hit. The cycle downbeat uses
/// `accent_velocity`.
pub fn click_track(grid: &GridSpec, channel: u8, key: u8, velocity: u8, accent_velocity: u8) -> Vec<StepEvent> {
    let beats_per_step = grid.beats_per_step();
    let spans: Vec<NoteSpan> = grid
        .hit_table()
        .into_iter()
        .map(|hit| {
            let velocity = if hit == 0 { accent_velocity } else { velocity };
            NoteSpan::new(hit as f64 * beats_per_step, beats_per_step, key)
                .with_channel(channel)
                .with_velocity(velocity)
        })
        .collect();

    to_step_events(&spans, grid, RoundingMode::Nearest)
}
