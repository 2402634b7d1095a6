pub mod config; // Session configuration and validation
pub mod engine; // Clock, cycle scheduler and the session loops
pub mod error;
pub mod io; // MIDI messages and ports
pub mod sequencing; // Clave grid, quantizer and step bridge

pub use config::{RuntimeConfig, RuntimeSpec};
pub use engine::{run_playback, run_practice, RunSummary, StopReason, StopSignal};
pub use error::ClaveError;
