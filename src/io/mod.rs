// Purpose - external interfaces, MIDI byte format

pub mod midi;
pub mod ports;

pub use midi::{EventKind, MidiEvent, TimedEvent};
pub use ports::{MidiSink, MidiSource, PortListing};
