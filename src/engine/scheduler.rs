//! Cycle scheduler - the due-time engine shared by playback and practice.
//!
//! Holds the pattern and click step lists for one session and sends each
//! event when its due instant (`anchor + step * seconds_per_step`) enters the
//! lookahead window. The anchor only moves forward, in whole cycles.

use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::{RuntimeSpec, SchedulerSpec};
use crate::engine::cursor::SchedulingCursor;
use crate::engine::telemetry::BarTelemetry;
use crate::error::ClaveError;
use crate::io::midi::{EventKind, MidiEvent};
use crate::io::ports::MidiSink;
use crate::sequencing::bridge::{click_track, sort_step_events, StepEvent};
use crate::sequencing::grid::GridSpec;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Messages sent by the scheduler, telemetry included
    pub sent: usize,
    /// Onsets dropped because they were already stale when reached
    pub stale_skipped: usize,
    /// Times the loop fell more than one cycle behind
    pub stalls: u64,
}

#[derive(Debug, Clone, Copy)]
enum Lane {
    Pattern,
    Click,
}

/// Due instant plus bridge order; events are sent in ascending order of this
pub(crate) type SendOrder = (Duration, (EventKind, u8, u8));

pub struct Scheduler {
    grid: GridSpec,
    timing: SchedulerSpec,
    pattern: Vec<StepEvent>,
    click: Vec<StepEvent>,
    telemetry: Option<BarTelemetry>,
    cursor: SchedulingCursor,
    max_cycles: Option<u32>,
    /// Notes this scheduler started and has not released: (channel, key)
    sounding: Vec<(u8, u8)>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// `pattern` is sorted here; the click list is built from `spec.click`
    pub fn new(spec: &RuntimeSpec, mut pattern: Vec<StepEvent>, start: Duration) -> Self {
        let grid = spec.grid;
        sort_step_events(&mut pattern);

        let click = if spec.click.enabled {
            click_track(
                &grid,
                spec.click.channel,
                spec.click.key,
                spec.click.velocity,
                spec.click.accent_velocity,
            )
        } else {
            Vec::new()
        };

        let telemetry = spec
            .telemetry
            .enabled
            .then(|| BarTelemetry::new(spec.telemetry, &grid, spec.max_cycles));

        Self {
            grid,
            timing: spec.scheduler,
            pattern,
            click,
            telemetry,
            cursor: SchedulingCursor::new(start),
            max_cycles: spec.max_cycles,
            sounding: Vec::with_capacity(16),
            stats: SchedulerStats::default(),
        }
    }

    pub fn cursor(&self) -> &SchedulingCursor {
        &self.cursor
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn sounding(&self) -> &[(u8, u8)] {
        &self.sounding
    }

    /// Wall-clock instant of `step` in the current cycle
    pub fn due(&self, step: u32) -> Duration {
        self.cursor.anchor() + self.grid.step_offset(step)
    }

    /// Roll the anchor forward if `now` has left the current cycle.
    ///
    /// Releases of sounding notes still queued in the cycle being left go
    /// out first, and a multi-cycle jump releases whatever is left, so
    /// skipping cycles can never strand a note. Returns the number of cycles
    /// moved.
    pub fn advance(&mut self, now: Duration, sink: &mut impl MidiSink) -> Result<u64, ClaveError> {
        let cycle = self.grid.cycle_duration();
        if now < self.cursor.anchor() + cycle {
            return Ok(0);
        }

        self.flush_releases(sink)?;

        let moved = self.cursor.catch_up(now, cycle);
        if moved > 1 {
            self.stats.stalls += 1;
            warn!(
                "Scheduler fell behind; skipped {} cycle(s) without replaying them",
                moved - 1
            );
            // notes sent ahead of the roll lost their releases with the skipped cycle
            self.release_sounding(sink)?;
        }
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.roll(moved == 1);
        }
        debug!(
            "Cycle {} anchored at {:.3}s",
            self.cursor.cycles(),
            self.cursor.anchor().as_secs_f64()
        );

        Ok(moved)
    }

    /// Send everything due by `now + lookahead` that has not been sent.
    ///
    /// When the horizon reaches past the end of the cycle, the next cycle's
    /// first events go out too, so the downbeat gets the same lookahead as
    /// every other step. A cycle beyond `max_cycles` is never started.
    ///
    /// An event more than `lookahead + poll_interval` behind `now` is stale.
    /// Stale onsets and control messages are skipped. Releases only go out
    /// for notes this scheduler has sounding.
    pub fn dispatch(&mut self, now: Duration, sink: &mut impl MidiSink) -> Result<usize, ClaveError> {
        self.dispatch_before(now, None, sink)
    }

    /// [`dispatch`](Self::dispatch), stopping short of the first event that
    /// does not sort before `bound`. Lets another lane interleave its own
    /// events in send order.
    pub(crate) fn dispatch_before(
        &mut self,
        now: Duration,
        bound: Option<SendOrder>,
        sink: &mut impl MidiSink,
    ) -> Result<usize, ClaveError> {
        let horizon = now + self.timing.lookahead;
        let stale_before = now.saturating_sub(self.timing.stale_after());
        let next_anchor = self.cursor.anchor() + self.grid.cycle_duration();
        let before = self.stats.sent;

        if let Some(telemetry) = self.telemetry.as_mut() {
            self.stats.sent += telemetry.poll(
                self.cursor.cycles(),
                self.cursor.anchor(),
                horizon,
                &self.grid,
                sink,
            )?;
        }

        while let Some((lane, next)) = self.peek(self.cursor.pattern_next(), self.cursor.click_next()) {
            let due = self.due(next.step);
            if due > horizon || bound.is_some_and(|b| (due, next.event.order_key()) >= b) {
                return Ok(self.stats.sent - before);
            }
            match lane {
                Lane::Pattern => self.cursor.advance_pattern(),
                Lane::Click => self.cursor.advance_click(),
            }

            if due < stale_before && !next.event.is_release() {
                if next.event.kind() == EventKind::Onset {
                    self.stats.stale_skipped += 1;
                }
                debug!("Skipping stale {:?} at step {}", next.event, next.step);
                continue;
            }
            self.emit_scheduled(next, sink)?;
        }

        // the whole current cycle is out; look into the next one
        if horizon >= next_anchor && now < next_anchor && self.may_start(self.cursor.cycles() + 1) {
            if let Some(telemetry) = self.telemetry.as_mut() {
                self.stats.sent += telemetry.poll_next(
                    self.cursor.cycles(),
                    self.cursor.anchor(),
                    horizon,
                    &self.grid,
                    sink,
                )?;
            }

            loop {
                let (pattern_next, click_next) = self.cursor.carried();
                let Some((lane, next)) = self.peek(pattern_next, click_next) else {
                    break;
                };
                let due = next_anchor + self.grid.step_offset(next.step);
                if due > horizon || bound.is_some_and(|b| (due, next.event.order_key()) >= b) {
                    break;
                }
                match lane {
                    Lane::Pattern => self.cursor.advance_carried_pattern(),
                    Lane::Click => self.cursor.advance_carried_click(),
                }
                trace!("Sending {:?} ahead of the cycle roll", next.event);
                self.emit_scheduled(next, sink)?;
            }
        }

        Ok(self.stats.sent - before)
    }

    /// Release every note this scheduler left sounding. Called on exit.
    pub fn release_sounding(&mut self, sink: &mut impl MidiSink) -> Result<usize, ClaveError> {
        let notes = std::mem::take(&mut self.sounding);
        for &(channel, key) in &notes {
            let release = MidiEvent::NoteOff {
                channel,
                key,
                velocity: 0,
            };
            sink.send(&release)?;
            self.stats.sent += 1;
            trace!("Released {:?} on exit", release);
        }
        Ok(notes.len())
    }

    /// Next unsent event across both lanes, in bridge order
    fn peek(&self, pattern_next: usize, click_next: usize) -> Option<(Lane, StepEvent)> {
        let pattern = self.pattern.get(pattern_next).copied();
        let click = self.click.get(click_next).copied();

        match (pattern, click) {
            (Some(p), Some(c)) => {
                if (c.step, c.event.order_key()) < (p.step, p.event.order_key()) {
                    Some((Lane::Click, c))
                } else {
                    Some((Lane::Pattern, p))
                }
            }
            (Some(p), None) => Some((Lane::Pattern, p)),
            (None, Some(c)) => Some((Lane::Click, c)),
            (None, None) => None,
        }
    }

    /// Send the releases of sounding notes left in the current cycle
    fn flush_releases(&mut self, sink: &mut impl MidiSink) -> Result<(), ClaveError> {
        let leftover: Vec<MidiEvent> = self.pattern[self.cursor.pattern_next().min(self.pattern.len())..]
            .iter()
            .chain(&self.click[self.cursor.click_next().min(self.click.len())..])
            .map(|e| e.event)
            .filter(|e| e.is_release())
            .collect();

        for event in leftover {
            if self.is_sounding(&event) {
                debug!("Flushing {:?} before cycle roll", event);
                self.emit(event, sink)?;
            }
        }
        Ok(())
    }

    fn may_start(&self, cycle: u64) -> bool {
        self.max_cycles.map_or(true, |max| cycle < max as u64)
    }

    /// Send a pattern or click event. A release whose note is not sounding
    /// is dropped: its onset was skipped, or it wrapped in from a cycle that
    /// never played.
    fn emit_scheduled(&mut self, next: StepEvent, sink: &mut impl MidiSink) -> Result<(), ClaveError> {
        if next.event.is_release() && !self.is_sounding(&next.event) {
            trace!("Dropping release of silent note {:?} at step {}", next.event, next.step);
            return Ok(());
        }
        self.emit(next.event, sink)
    }

    fn is_sounding(&self, event: &MidiEvent) -> bool {
        event
            .key()
            .is_some_and(|key| self.sounding.contains(&(event.channel(), key)))
    }

    fn emit(&mut self, event: MidiEvent, sink: &mut impl MidiSink) -> Result<(), ClaveError> {
        sink.send(&event)?;
        self.stats.sent += 1;
        trace!("Sent {:?}", event);

        if let Some(key) = event.key() {
            let note = (event.channel(), key);
            match event.kind() {
                EventKind::Onset => {
                    if !self.sounding.contains(&note) {
                        self.sounding.push(note);
                    }
                }
                EventKind::Release => self.sounding.retain(|&n| n != note),
                EventKind::Control => {}
            }
        }
        Ok(())
    }
}
