/*
Practice Lock
=============

Live input is measured against the clave grid and re-emitted on it.

For every incoming note event:
    1. onset (note-on, velocity > 0) or release (note-off, or note-on at 0)
    2. position = (time since anchor mod cycle) / seconds_per_step
    3. quantize position with the session rounding mode
    4. strict off, or the quantized step is a clave hit -> accept that step
    5. otherwise find the nearest hit (wrap-aware):
         within the tolerance window -> pass through untouched, right now
         release outside the window  -> forward as-is (releases never drop)
         onset outside the window    -> reject, or snap to the hit

Accepted and snapped events are sent at their step's due instant. A due
instant already in the past moves to the next grid step instead of going out
late. A release is never scheduled at or before its own onset.

When the loop stops, queued releases go out, queued onsets are dropped and
every note still held by the player is released.
*/

use std::time::Duration;

use log::{debug, info, trace};

use crate::config::{PracticeSpec, RuntimeSpec};
use crate::engine::clock::Clock;
use crate::engine::playback::reached_limit;
use crate::engine::scheduler::{Scheduler, SendOrder};
use crate::engine::{RunSummary, StopReason, StopSignal};
use crate::error::ClaveError;
use crate::io::midi::{EventKind, MidiEvent, TimedEvent};
use crate::io::ports::{MidiSink, MidiSource};
use crate::sequencing::grid::GridSpec;
use crate::sequencing::quantize::{is_allowed, nearest_hit, round_position, wrap_step};

/// What the lock did with one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockAction {
    /// On an allowed step; sent at that step
    Accept { step: u32 },
    /// Off-grid onset moved onto the nearest hit
    Snap { from: u32, to: u32 },
    /// Off-grid but inside the tolerance window; sent untouched
    PassThrough { hit: u32, distance_ms: f64 },
    /// Off-grid release outside the window; sent untouched
    Forward { hit: u32, distance_ms: f64 },
    /// Off-grid onset dropped
    Reject { step: u32, hit: u32 },
    /// Not a note message; sent untouched
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockDecision {
    pub kind: EventKind,
    /// Fractional step within the cycle
    pub position: f64,
    /// Rounded step, wrapped into the cycle
    pub quantized: u32,
    pub action: LockAction,
    /// Due instant relative to the anchor, in seconds, for accept/snap
    target: Option<f64>,
}

impl LockDecision {
    /// Grid step the event is re-emitted on, if it is re-timed
    pub fn output_step(&self) -> Option<u32> {
        match self.action {
            LockAction::Accept { step } => Some(step),
            LockAction::Snap { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// Result of feeding one event to the lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ingested {
    pub decision: LockDecision,
    /// When the event goes out; `None` when it was rejected
    pub due: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PracticeStats {
    pub onsets_in: usize,
    pub releases_in: usize,
    pub onsets_out: usize,
    pub releases_out: usize,
    pub accepted: usize,
    pub snapped: usize,
    pub passed_through: usize,
    pub forwarded: usize,
    pub rejected: usize,
    /// Non-note messages forwarded untouched
    pub bypassed: usize,
    /// Accepted or snapped events whose step had already passed
    pub pushed_late: usize,
    /// Pending onsets discarded when the loop stopped
    pub discarded_on_exit: usize,
    /// Note-offs sent on exit for notes still held
    pub released_on_exit: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Duration,
    event: MidiEvent,
}

pub struct PracticeLock {
    grid: GridSpec,
    rules: PracticeSpec,
    hits: Vec<u32>,
    /// Sorted by due time, then bridge order
    pending: Vec<Pending>,
    /// Scheduled instant of the latest onset per (channel, key)
    onsets: Vec<((u8, u8), Duration)>,
    /// Notes sent on and not yet off: (channel, key)
    sounding: Vec<(u8, u8)>,
    stats: PracticeStats,
}

impl PracticeLock {
    pub fn new(spec: &RuntimeSpec) -> Self {
        Self {
            grid: spec.grid,
            rules: spec.practice,
            hits: spec.grid.hit_table(),
            pending: Vec::with_capacity(32),
            onsets: Vec::with_capacity(16),
            sounding: Vec::with_capacity(16),
            stats: PracticeStats::default(),
        }
    }

    pub fn stats(&self) -> PracticeStats {
        self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn sounding(&self) -> &[(u8, u8)] {
        &self.sounding
    }

    /// Classify an event that arrived at `at` against the cycle anchored at
    /// `anchor`. Pure; nothing is sent or queued.
    pub fn decide(&self, event: &MidiEvent, at: Duration, anchor: Duration) -> LockDecision {
        let step_secs = self.grid.seconds_per_step();
        let cycle_secs = self.grid.seconds_per_cycle();
        let steps = self.grid.steps_per_cycle();

        // `at` may precede the anchor if the cycle rolled after arrival
        let since_anchor = at.as_secs_f64() - anchor.as_secs_f64();
        let cycle_start = (since_anchor / cycle_secs).floor() * cycle_secs;
        let position = (since_anchor - cycle_start) / step_secs;

        let rounded = round_position(position, self.rules.rounding);
        let quantized = wrap_step(rounded, steps);
        let kind = event.kind();

        let decision = |action, target| LockDecision {
            kind,
            position,
            quantized,
            action,
            target,
        };

        if kind == EventKind::Control {
            return decision(LockAction::Bypass, None);
        }

        let accept = decision(
            LockAction::Accept { step: quantized },
            Some(cycle_start + rounded as f64 * step_secs),
        );
        if is_allowed(quantized, &self.hits, self.rules.strict) {
            return accept;
        }
        let Some((hit, offset)) = nearest_hit(position, &self.hits, steps) else {
            return accept;
        };

        let distance_ms = offset.abs() * step_secs * 1000.0;
        let window_ms = match kind {
            EventKind::Release => self.rules.release_window_ms(),
            _ => self.rules.onset_window_ms(),
        };

        if distance_ms <= window_ms {
            decision(LockAction::PassThrough { hit, distance_ms }, None)
        } else if kind == EventKind::Release {
            decision(LockAction::Forward { hit, distance_ms }, None)
        } else if self.rules.reject_off_grid {
            decision(LockAction::Reject { step: quantized, hit }, None)
        } else {
            let snapped = (position + offset).round();
            decision(
                LockAction::Snap {
                    from: quantized,
                    to: hit,
                },
                Some(cycle_start + snapped * step_secs),
            )
        }
    }

    /// Decide and schedule one live event. Events due now go straight to
    /// `sink`; later ones wait for [`flush_due`](Self::flush_due).
    pub fn ingest(
        &mut self,
        input: TimedEvent,
        anchor: Duration,
        now: Duration,
        sink: &mut impl MidiSink,
    ) -> Result<Ingested, ClaveError> {
        let decision = self.decide(&input.event, input.at, anchor);

        match decision.kind {
            EventKind::Onset => self.stats.onsets_in += 1,
            EventKind::Release => self.stats.releases_in += 1,
            EventKind::Control => {}
        }

        let due = match (decision.action, decision.target) {
            (LockAction::Accept { .. }, Some(target)) | (LockAction::Snap { .. }, Some(target)) => {
                if matches!(decision.action, LockAction::Snap { .. }) {
                    self.stats.snapped += 1;
                } else {
                    self.stats.accepted += 1;
                }

                let due = offset_from(anchor, target);
                if due < now {
                    self.stats.pushed_late += 1;
                    self.next_step_at_or_after(anchor, now)
                } else {
                    due
                }
            }
            (LockAction::Reject { step, hit }, _) => {
                self.stats.rejected += 1;
                debug!("Rejected onset at step {} (nearest hit {})", step, hit);
                return Ok(Ingested { decision, due: None });
            }
            (LockAction::PassThrough { .. }, _) => {
                self.stats.passed_through += 1;
                now
            }
            (LockAction::Forward { .. }, _) => {
                self.stats.forwarded += 1;
                now
            }
            (LockAction::Bypass, _) => {
                self.stats.bypassed += 1;
                now
            }
            _ => now,
        };

        let due = self.schedule(due, input.event, now, sink)?;
        trace!(
            "{:?} at step {:.2} -> {:?}, due {:.3}s",
            decision.kind,
            decision.position,
            decision.action,
            due.as_secs_f64()
        );

        Ok(Ingested {
            decision,
            due: Some(due),
        })
    }

    /// Send queued events due by `horizon`
    pub fn flush_due(&mut self, horizon: Duration, sink: &mut impl MidiSink) -> Result<usize, ClaveError> {
        let ready = self.pending.partition_point(|p| p.due <= horizon);
        let due: Vec<Pending> = self.pending.drain(..ready).collect();
        for pending in &due {
            self.send(&pending.event, sink)?;
        }
        Ok(due.len())
    }

    /// Send order of the first queued event, if it is due by `horizon`
    pub(crate) fn next_due(&self, horizon: Duration) -> Option<SendOrder> {
        self.pending
            .first()
            .filter(|p| p.due <= horizon)
            .map(|p| (p.due, p.event.order_key()))
    }

    /// Send the first queued event
    pub(crate) fn send_next(&mut self, sink: &mut impl MidiSink) -> Result<(), ClaveError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let next = self.pending.remove(0);
        self.send(&next.event, sink)
    }

    /// Send every queued release immediately, drop queued onsets and release
    /// whatever is still sounding. Used when the loop stops.
    pub fn drain_releases(&mut self, sink: &mut impl MidiSink) -> Result<usize, ClaveError> {
        let pending = std::mem::take(&mut self.pending);
        let mut sent = 0;
        for p in pending {
            if p.event.is_release() {
                self.send(&p.event, sink)?;
                sent += 1;
            } else {
                self.stats.discarded_on_exit += 1;
            }
        }
        self.onsets.clear();

        for (channel, key) in std::mem::take(&mut self.sounding) {
            let release = MidiEvent::NoteOff {
                channel,
                key,
                velocity: 0,
            };
            sink.send(&release)?;
            self.stats.released_on_exit += 1;
            sent += 1;
            debug!("Released held {:?} on exit", release);
        }
        Ok(sent)
    }

    /// Queue or send `event` at `due`, keeping each release after its onset
    fn schedule(
        &mut self,
        mut due: Duration,
        event: MidiEvent,
        now: Duration,
        sink: &mut impl MidiSink,
    ) -> Result<Duration, ClaveError> {
        if let Some(key) = event.key() {
            let note = (event.channel(), key);
            let slot = self.onsets.iter().position(|(n, _)| *n == note);

            match event.kind() {
                EventKind::Onset => match slot {
                    Some(i) => self.onsets[i].1 = due,
                    None => self.onsets.push((note, due)),
                },
                EventKind::Release => {
                    if let Some(i) = slot {
                        let onset_due = self.onsets.swap_remove(i).1;
                        if due <= onset_due {
                            due = onset_due + self.grid.step_duration();
                        }
                    }
                }
                EventKind::Control => {}
            }
        }

        if due <= now {
            self.send(&event, sink)?;
        } else {
            let key = (due, event.order_key());
            let at = self
                .pending
                .partition_point(|p| (p.due, p.event.order_key()) <= key);
            self.pending.insert(at, Pending { due, event });
        }
        Ok(due)
    }

    fn send(&mut self, event: &MidiEvent, sink: &mut impl MidiSink) -> Result<(), ClaveError> {
        sink.send(event)?;
        let note = event.key().map(|key| (event.channel(), key));
        match (event.kind(), note) {
            (EventKind::Onset, Some(note)) => {
                self.stats.onsets_out += 1;
                if !self.sounding.contains(&note) {
                    self.sounding.push(note);
                }
            }
            (EventKind::Release, Some(note)) => {
                self.stats.releases_out += 1;
                self.sounding.retain(|&n| n != note);
            }
            _ => {}
        }
        Ok(())
    }

    /// First grid instant at or after `now`
    fn next_step_at_or_after(&self, anchor: Duration, now: Duration) -> Duration {
        let step_secs = self.grid.seconds_per_step();
        let since_anchor = now.as_secs_f64() - anchor.as_secs_f64();
        let steps = (since_anchor / step_secs - 1e-9).ceil();
        offset_from(anchor, steps * step_secs).max(now)
    }
}

/// `anchor + seconds`, where `seconds` may be negative
fn offset_from(anchor: Duration, seconds: f64) -> Duration {
    if seconds >= 0.0 {
        anchor + Duration::from_secs_f64(seconds)
    } else {
        anchor.saturating_sub(Duration::from_secs_f64(-seconds))
    }
}

/// Run the practice loop: lock live input from `input` onto the clave grid
/// while the click (and telemetry, when enabled) plays.
///
/// Fails with [`ClaveError::MissingInputPort`] before anything is sent when
/// no input is given. Live output and the click are interleaved in send
/// order. On exit queued releases are flushed, queued onsets are dropped and
/// every held note and sounding click is released.
pub fn run_practice<C: Clock, S: MidiSource, K: MidiSink>(
    spec: &RuntimeSpec,
    input: Option<&mut S>,
    sink: &mut K,
    clock: &C,
    stop: &StopSignal,
) -> Result<RunSummary, ClaveError> {
    let input = input.ok_or(ClaveError::MissingInputPort)?;

    let mut scheduler = Scheduler::new(spec, Vec::new(), clock.now());
    let mut lock = PracticeLock::new(spec);
    info!(
        "Practice started: {} BPM, clave {:?}, strict {}, onset window {} ms, release window {} ms",
        spec.grid.tempo(),
        spec.grid.pattern(),
        spec.practice.strict,
        spec.practice.onset_window_ms(),
        spec.practice.release_window_ms()
    );

    let reason = loop {
        if stop.is_triggered() {
            break StopReason::Interrupted;
        }

        let now = clock.now();
        scheduler.advance(now, sink)?;
        if reached_limit(spec, scheduler.cursor().cycles()) {
            break StopReason::CycleLimit;
        }

        let anchor = scheduler.cursor().anchor();
        while let Some(event) = input.pop() {
            lock.ingest(event, anchor, now, sink)?;
        }
        let horizon = now + spec.scheduler.lookahead;
        while let Some(order) = lock.next_due(horizon) {
            scheduler.dispatch_before(now, Some(order), sink)?;
            lock.send_next(sink)?;
        }
        scheduler.dispatch(now, sink)?;

        clock.sleep(spec.scheduler.poll_interval);
    };

    lock.drain_releases(sink)?;
    scheduler.release_sounding(sink)?;

    let practice = lock.stats();
    let stats = scheduler.stats();
    let summary = RunSummary {
        cycles: scheduler.cursor().cycles(),
        sent: stats.sent
            + practice.onsets_out
            + practice.releases_out
            + practice.bypassed
            + practice.released_on_exit,
        stale_skipped: stats.stale_skipped,
        stalls: stats.stalls,
        reason,
        practice: Some(practice),
    };
    info!(
        "Practice stopped ({:?}): {} accepted, {} snapped, {} passed through, {} rejected",
        reason, practice.accepted, practice.snapped, practice.passed_through, practice.rejected
    );
    Ok(summary)
}
