use std::time::Duration;

/// A channel voice message. Channels are 0-based (0..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

/// How a message takes part in scheduling.
///
/// The derived order is the send order for messages due at the same
/// instant: releases go out before onsets so a re-struck note is never cut
/// off by its own earlier release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Release,
    Onset,
    Control,
}

impl MidiEvent {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }

    /// Note number for note messages
    pub fn key(&self) -> Option<u8> {
        match *self {
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key, .. } => Some(key),
            _ => None,
        }
    }

    /// A note-on with zero velocity counts as a release
    pub fn kind(&self) -> EventKind {
        match *self {
            MidiEvent::NoteOn { velocity, .. } if velocity > 0 => EventKind::Onset,
            MidiEvent::NoteOn { .. } | MidiEvent::NoteOff { .. } => EventKind::Release,
            _ => EventKind::Control,
        }
    }

    pub fn is_release(&self) -> bool {
        self.kind() == EventKind::Release
    }

    /// Sort key for messages due at the same step
    pub(crate) fn order_key(&self) -> (EventKind, u8, u8) {
        let detail = match *self {
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key, .. } => key,
            MidiEvent::ControlChange { controller, .. } => controller,
            MidiEvent::ProgramChange { program, .. } => program,
            MidiEvent::PitchBend { .. } => 0,
        };
        (self.kind(), self.channel(), detail)
    }

    /// Encode as a raw MIDI message. Returns the buffer and the number of
    /// bytes used.
    pub fn to_bytes(&self) -> ([u8; 3], usize) {
        match *self {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => ([0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F], 3),
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => ([0x80 | (channel & 0x0F), key & 0x7F, velocity & 0x7F], 3),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => ([0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F], 3),
            MidiEvent::ProgramChange { channel, program } => {
                ([0xC0 | (channel & 0x0F), program & 0x7F, 0], 2)
            }
            MidiEvent::PitchBend { channel, value } => {
                let raw = (value.clamp(-8192, 8191) + 8192) as u16;
                (
                    [0xE0 | (channel & 0x0F), (raw & 0x7F) as u8, (raw >> 7) as u8],
                    3,
                )
            }
        }
    }

    /// Decode a raw MIDI message. Note-on with velocity 0 is kept as a
    /// note-on; `kind` reports it as a release.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;

        match (status & 0xF0, data) {
            (0x90, [key, velocity, ..]) => Some(MidiEvent::NoteOn {
                channel,
                key: *key,
                velocity: *velocity,
            }),
            (0x80, [key, velocity, ..]) => Some(MidiEvent::NoteOff {
                channel,
                key: *key,
                velocity: *velocity,
            }),
            (0xB0, [controller, value, ..]) => Some(MidiEvent::ControlChange {
                channel,
                controller: *controller,
                value: *value,
            }),
            (0xC0, [program, ..]) => Some(MidiEvent::ProgramChange {
                channel,
                program: *program,
            }),
            (0xE0, [lsb, msb, ..]) => {
                let raw = ((*msb as i16) << 7) | *lsb as i16;
                Some(MidiEvent::PitchBend {
                    channel,
                    value: raw - 8192,
                })
            }
            _ => None,
        }
    }
}

/// An incoming message stamped with the clock time it arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: MidiEvent,
}

impl TimedEvent {
    pub fn new(at: Duration, event: MidiEvent) -> Self {
        Self { at, event }
    }
}
