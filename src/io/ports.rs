//! Output/input endpoints.
//!
//! The schedulers only see the [`MidiSink`] and [`MidiSource`] traits. With
//! the `midir` feature, [`OutputPort`] and [`InputPort`] bind them to real
//! system endpoints; both close their connection when dropped.

#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::error::ClaveError;
use crate::io::midi::{MidiEvent, TimedEvent};

/// Destination for scheduled messages
pub trait MidiSink {
    fn send(&mut self, event: &MidiEvent) -> Result<(), ClaveError>;
}

/// Non-blocking feed of live input
pub trait MidiSource {
    fn pop(&mut self) -> Option<TimedEvent>;
}

impl MidiSink for Vec<MidiEvent> {
    fn send(&mut self, event: &MidiEvent) -> Result<(), ClaveError> {
        self.push(*event);
        Ok(())
    }
}

impl<S: MidiSink + ?Sized> MidiSink for &mut S {
    fn send(&mut self, event: &MidiEvent) -> Result<(), ClaveError> {
        (**self).send(event)
    }
}

#[cfg(feature = "rtrb")]
impl MidiSource for Consumer<TimedEvent> {
    fn pop(&mut self) -> Option<TimedEvent> {
        Consumer::pop(self).ok()
    }
}

/// Endpoint names visible to this process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortListing {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

#[cfg(feature = "midir")]
pub use self::system::{list_ports, InputPort, OutputPort};

#[cfg(feature = "midir")]
mod system {
    use log::{info, warn};
    use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
    use rtrb::{Consumer, RingBuffer};

    use super::{MidiSink, MidiSource, PortListing};
    use crate::engine::clock::{Clock, SystemClock};
    use crate::error::ClaveError;
    use crate::io::midi::{MidiEvent, TimedEvent};

    const CLIENT_NAME: &str = "clave_lock";

    /// Live input is queued here between the backend callback and the loop
    const INPUT_QUEUE_CAPACITY: usize = 512;

    fn backend(err: impl std::fmt::Display) -> ClaveError {
        ClaveError::Backend(err.to_string())
    }

    pub fn list_ports() -> Result<PortListing, ClaveError> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(backend)?;
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(backend)?;

        let inputs = midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect();
        let outputs = midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect();

        Ok(PortListing { inputs, outputs })
    }

    /// Pick the first port whose name contains `wanted`, or the first port
    /// at all when no name is given.
    fn select<P: Clone>(
        ports: &[P],
        name_of: impl Fn(&P) -> Option<String>,
        wanted: Option<&str>,
        direction: &'static str,
    ) -> Result<(P, String), ClaveError> {
        let mut named = ports.iter().filter_map(|p| name_of(p).map(|n| (p.clone(), n)));
        match wanted {
            Some(wanted) => named
                .find(|(_, name)| name.contains(wanted))
                .ok_or_else(|| ClaveError::PortNotFound(wanted.to_string())),
            None => named.next().ok_or(ClaveError::NoPorts(direction)),
        }
    }

    /// An open output connection
    pub struct OutputPort {
        name: String,
        connection: MidiOutputConnection,
    }

    impl OutputPort {
        pub fn open(wanted: Option<&str>) -> Result<Self, ClaveError> {
            let midi_out = MidiOutput::new(CLIENT_NAME).map_err(backend)?;
            let ports = midi_out.ports();
            let (port, name) = select(&ports, |p| midi_out.port_name(p).ok(), wanted, "output")?;

            let connection = midi_out.connect(&port, "clave-out").map_err(backend)?;
            info!("Opened MIDI output '{}'", name);

            Ok(Self { name, connection })
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl MidiSink for OutputPort {
        fn send(&mut self, event: &MidiEvent) -> Result<(), ClaveError> {
            let (bytes, len) = event.to_bytes();
            self.connection
                .send(&bytes[..len])
                .map_err(|e| ClaveError::Send(e.to_string()))
        }
    }

    /// An open input connection. Messages are stamped with `clock` on arrival
    /// and queued for the practice loop.
    pub struct InputPort {
        name: String,
        _connection: MidiInputConnection<()>,
        queue: Consumer<TimedEvent>,
    }

    impl InputPort {
        pub fn open(wanted: Option<&str>, clock: SystemClock) -> Result<Self, ClaveError> {
            let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(backend)?;
            midi_in.ignore(Ignore::SysexAndTime);

            let ports = midi_in.ports();
            let (port, name) = select(&ports, |p| midi_in.port_name(p).ok(), wanted, "input")?;

            let (mut producer, queue) = RingBuffer::<TimedEvent>::new(INPUT_QUEUE_CAPACITY);
            let connection = midi_in
                .connect(
                    &port,
                    "clave-in",
                    move |_stamp, message, _| {
                        if let Some(event) = MidiEvent::from_bytes(message) {
                            if producer.push(TimedEvent::new(clock.now(), event)).is_err() {
                                warn!("Input queue full, dropping {:?}", event);
                            }
                        }
                    },
                    (),
                )
                .map_err(backend)?;
            info!("Opened MIDI input '{}'", name);

            Ok(Self {
                name,
                _connection: connection,
                queue,
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl MidiSource for InputPort {
        fn pop(&mut self) -> Option<TimedEvent> {
            self.queue.pop().ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_records_in_order() {
        let mut sink: Vec<MidiEvent> = Vec::new();
        let on = MidiEvent::NoteOn {
            channel: 0,
            key: 60,
            velocity: 90,
        };
        let off = MidiEvent::NoteOff {
            channel: 0,
            key: 60,
            velocity: 0,
        };
        sink.send(&on).unwrap();
        (&mut sink).send(&off).unwrap();
        assert_eq!(sink, vec![on, off]);
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn test_ring_buffer_consumer_is_a_source() {
        use std::time::Duration;

        let (mut tx, mut rx) = rtrb::RingBuffer::<TimedEvent>::new(4);
        let ev = TimedEvent::new(
            Duration::from_millis(5),
            MidiEvent::NoteOn {
                channel: 9,
                key: 75,
                velocity: 100,
            },
        );
        tx.push(ev).unwrap();
        assert_eq!(MidiSource::pop(&mut rx), Some(ev));
        assert_eq!(MidiSource::pop(&mut rx), None);
    }
}
