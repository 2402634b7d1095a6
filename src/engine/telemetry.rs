//! Bar-boundary progress messages.
//!
//! At the top of every bar two control changes go out: bars remaining in the
//! session and the running bar index. Both are 7-bit values, so they clamp at
//! 127; an unbounded session always reports 127 remaining.

use std::time::Duration;

use log::trace;

use crate::config::TelemetrySpec;
use crate::error::ClaveError;
use crate::io::midi::MidiEvent;
use crate::io::ports::MidiSink;
use crate::sequencing::grid::GridSpec;

const MAX_VALUE: u64 = 127;

#[derive(Debug, Clone)]
pub struct BarTelemetry {
    spec: TelemetrySpec,
    steps_per_bar: u32,
    total_bars: Option<u64>,
    /// One flag per bar of the current cycle
    emitted: Vec<bool>,
    /// Same, for the next cycle's bars reached by the lookahead
    carried: Vec<bool>,
}

impl BarTelemetry {
    pub fn new(spec: TelemetrySpec, grid: &GridSpec, max_cycles: Option<u32>) -> Self {
        let bars_per_cycle = grid.bars_per_cycle();
        Self {
            spec,
            steps_per_bar: grid.steps_per_bar(),
            total_bars: max_cycles.map(|c| c as u64 * bars_per_cycle as u64),
            emitted: vec![false; bars_per_cycle as usize],
            carried: vec![false; bars_per_cycle as usize],
        }
    }

    /// Bars left when `bar` (0-based, counted from session start) begins.
    /// The final bar reports 1.
    pub fn countdown(&self, bar: u64) -> u8 {
        match self.total_bars {
            Some(total) => total.saturating_sub(bar).min(MAX_VALUE) as u8,
            None => MAX_VALUE as u8,
        }
    }

    pub fn bar_value(bar: u64) -> u8 {
        bar.min(MAX_VALUE) as u8
    }

    /// Countdown first, then bar index
    pub fn messages(&self, bar: u64) -> [MidiEvent; 2] {
        [
            MidiEvent::ControlChange {
                channel: self.spec.channel,
                controller: self.spec.countdown_cc,
                value: self.countdown(bar),
            },
            MidiEvent::ControlChange {
                channel: self.spec.channel,
                controller: self.spec.bar_cc,
                value: Self::bar_value(bar),
            },
        ]
    }

    /// Move to the next cycle's flags when the anchor moves by one cycle;
    /// forget everything after a longer jump
    pub fn roll(&mut self, carry: bool) {
        if carry {
            std::mem::swap(&mut self.emitted, &mut self.carried);
        } else {
            self.emitted.fill(false);
        }
        self.carried.fill(false);
    }

    /// Emit every bar boundary of the current cycle due by `horizon` that has
    /// not gone out yet. Returns the number of messages sent.
    pub fn poll(
        &mut self,
        cycle: u64,
        anchor: Duration,
        horizon: Duration,
        grid: &GridSpec,
        sink: &mut impl MidiSink,
    ) -> Result<usize, ClaveError> {
        self.emit_due(false, cycle, anchor, horizon, grid, sink)
    }

    /// Same as [`poll`](Self::poll) for the cycle after `cycle`, whose first
    /// bars can fall inside the lookahead before the anchor rolls
    pub fn poll_next(
        &mut self,
        cycle: u64,
        anchor: Duration,
        horizon: Duration,
        grid: &GridSpec,
        sink: &mut impl MidiSink,
    ) -> Result<usize, ClaveError> {
        self.emit_due(true, cycle + 1, anchor + grid.cycle_duration(), horizon, grid, sink)
    }

    fn emit_due(
        &mut self,
        next: bool,
        cycle: u64,
        anchor: Duration,
        horizon: Duration,
        grid: &GridSpec,
        sink: &mut impl MidiSink,
    ) -> Result<usize, ClaveError> {
        let bars_per_cycle = self.emitted.len();
        let mut sent = 0;

        for bar_in_cycle in 0..bars_per_cycle {
            let done = if next { self.carried[bar_in_cycle] } else { self.emitted[bar_in_cycle] };
            if done {
                continue;
            }
            let due = anchor + grid.step_offset(bar_in_cycle as u32 * self.steps_per_bar);
            if due > horizon {
                break;
            }

            let bar = cycle * bars_per_cycle as u64 + bar_in_cycle as u64;
            for message in self.messages(bar) {
                sink.send(&message)?;
                sent += 1;
            }
            trace!("Bar {} telemetry sent (countdown {})", bar, self.countdown(bar));
            if next {
                self.carried[bar_in_cycle] = true;
            } else {
                self.emitted[bar_in_cycle] = true;
            }
        }

        Ok(sent)
    }
}
