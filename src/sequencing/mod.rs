pub mod bridge;
pub mod grid;
pub mod notes;
pub mod quantize;

pub use bridge::{click_track, to_step_events, NoteSpan, StepEvent};
pub use grid::{ClavePattern, GridSpec, Resolution};
pub use quantize::RoundingMode;
