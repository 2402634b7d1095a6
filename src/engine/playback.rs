//! Playback loop: plays a bridged pattern on the cycle grid until
//! interrupted or until the configured number of cycles has passed.

use log::info;

use crate::config::RuntimeSpec;
use crate::engine::clock::Clock;
use crate::engine::scheduler::Scheduler;
use crate::engine::{RunSummary, StopReason, StopSignal};
use crate::error::ClaveError;
use crate::io::ports::MidiSink;
use crate::sequencing::bridge::StepEvent;

/// Run the playback scheduler over `pattern`.
///
/// Each iteration checks `stop`, rolls the cycle anchor, sends whatever is
/// due within the lookahead and sleeps for the poll interval. Notes still
/// sounding when the loop ends are released before returning.
pub fn run_playback<C: Clock, K: MidiSink>(
    spec: &RuntimeSpec,
    pattern: &[StepEvent],
    sink: &mut K,
    clock: &C,
    stop: &StopSignal,
) -> Result<RunSummary, ClaveError> {
    let mut scheduler = Scheduler::new(spec, pattern.to_vec(), clock.now());
    info!(
        "Playback started: {} BPM, {} steps per cycle, clave {:?}, {} pattern events",
        spec.grid.tempo(),
        spec.grid.steps_per_cycle(),
        spec.grid.pattern(),
        pattern.len()
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

        scheduler.dispatch(now, sink)?;
        clock.sleep(spec.scheduler.poll_interval);
    };

    scheduler.release_sounding(sink)?;

    let stats = scheduler.stats();
    let summary = RunSummary {
        cycles: scheduler.cursor().cycles(),
        sent: stats.sent,
        stale_skipped: stats.stale_skipped,
        stalls: stats.stalls,
        reason,
        practice: None,
    };
    info!(
        "Playback stopped ({:?}) after {} cycle(s), {} messages sent",
        reason, summary.cycles, summary.sent
    );
    Ok(summary)
}

pub(crate) fn reached_limit(spec: &RuntimeSpec, cycles: u64) -> bool {
    spec.max_cycles.is_some_and(|max| cycles >= max as u64)
}
