//! Real-time engine: clock, cycle scheduler and the two session loops.

pub mod clock;
pub mod cursor;
pub mod playback;
pub mod practice;
pub mod scheduler;
pub mod telemetry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::playback::run_playback;
pub use self::practice::{run_practice, LockAction, LockDecision, PracticeLock, PracticeStats};
pub use self::scheduler::{Scheduler, SchedulerStats};

/// Interrupt flag checked at the top of every loop iteration.
/// Clones share the flag, so one can be handed to a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop signal was raised
    Interrupted,
    /// `max_cycles` cycles completed
    CycleLimit,
}

/// What a finished loop reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Whole cycles completed
    pub cycles: u64,
    /// Messages sent, telemetry and exit releases included
    pub sent: usize,
    pub stale_skipped: usize,
    /// Times the loop fell more than one cycle behind
    pub stalls: u64,
    pub reason: StopReason,
    /// Lock counters; practice sessions only
    pub practice: Option<PracticeStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_clones_share_flag() {
        let stop = StopSignal::new();
        let handler = stop.clone();
        assert!(!stop.is_triggered());
        handler.trigger();
        assert!(stop.is_triggered());
    }
}
