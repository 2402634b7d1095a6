#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use clave_lock::engine::{Clock, ManualClock, StopSignal};
use clave_lock::io::midi::{EventKind, MidiEvent, TimedEvent};
use clave_lock::io::ports::{MidiSink, MidiSource};
use clave_lock::ClaveError;

/// Output that records every message with the virtual time it was sent at.
/// Can stall the clock or raise the stop signal after a given message count.
pub struct RecordingSink {
    clock: ManualClock,
    pub log: Vec<(Duration, MidiEvent)>,
    stall: Option<(usize, Duration)>,
    stop: Option<(usize, StopSignal)>,
}

impl RecordingSink {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            log: Vec::new(),
            stall: None,
            stop: None,
        }
    }

    /// Jump the clock forward by `by` once `count` messages have gone out
    pub fn stall_after(mut self, count: usize, by: Duration) -> Self {
        self.stall = Some((count, by));
        self
    }

    pub fn stop_after(mut self, count: usize, stop: &StopSignal) -> Self {
        self.stop = Some((count, stop.clone()));
        self
    }

    pub fn events(&self) -> impl Iterator<Item = &MidiEvent> {
        self.log.iter().map(|(_, e)| e)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().filter(|e| e.kind() == kind).count()
    }

    /// Every onset on `channel` has a later release of the same key
    pub fn all_released(&self, channel: u8) -> bool {
        let mut sounding: Vec<u8> = Vec::new();
        for event in self.events().filter(|e| e.channel() == channel) {
            let Some(key) = event.key() else { continue };
            match event.kind() {
                EventKind::Onset => sounding.push(key),
                EventKind::Release => sounding.retain(|&k| k != key),
                EventKind::Control => {}
            }
        }
        sounding.is_empty()
    }
}

impl MidiSink for RecordingSink {
    fn send(&mut self, event: &MidiEvent) -> Result<(), ClaveError> {
        self.log.push((self.clock.now(), *event));

        if let Some((count, by)) = self.stall {
            if self.log.len() == count {
                self.clock.advance(by);
            }
        }
        if let Some((count, stop)) = &self.stop {
            if self.log.len() >= *count {
                stop.trigger();
            }
        }
        Ok(())
    }
}

/// Live input replayed from a script; an event becomes available once the
/// clock reaches its arrival time.
pub struct ScriptedInput {
    clock: ManualClock,
    script: VecDeque<TimedEvent>,
}

impl ScriptedInput {
    pub fn new(clock: &ManualClock, mut events: Vec<TimedEvent>) -> Self {
        events.sort_by_key(|e| e.at);
        Self {
            clock: clock.clone(),
            script: events.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl MidiSource for ScriptedInput {
    fn pop(&mut self) -> Option<TimedEvent> {
        match self.script.front() {
            Some(next) if next.at <= self.clock.now() => self.script.pop_front(),
            _ => None,
        }
    }
}

pub fn note_on(key: u8, at_ms: f64) -> TimedEvent {
    TimedEvent::new(
        micros(at_ms),
        MidiEvent::NoteOn {
            channel: 0,
            key,
            velocity: 100,
        },
    )
}

pub fn note_off(key: u8, at_ms: f64) -> TimedEvent {
    TimedEvent::new(
        micros(at_ms),
        MidiEvent::NoteOff {
            channel: 0,
            key,
            velocity: 0,
        },
    )
}

pub fn micros(ms: f64) -> Duration {
    Duration::from_micros((ms * 1000.0).round() as u64)
}
