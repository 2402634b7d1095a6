use thiserror::Error;

/// Errors raised while building a session or talking to MIDI ports.
///
/// Everything except the port variants is a configuration error and is
/// reported before any message is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaveError {
    #[error("Invalid tempo: {0} BPM (must be a positive, finite number)")]
    InvalidTempo(f64),

    #[error("Unsupported grid resolution {0}: expected 8 or 16 steps per bar")]
    InvalidResolution(u32),

    #[error("Unknown clave pattern '{0}': expected 'a' or 'b'")]
    UnknownPattern(String),

    #[error("Unknown rounding mode '{0}': expected 'nearest', 'floor' or 'ceil'")]
    UnknownRounding(String),

    #[error("Invalid setting {field}: {message}")]
    InvalidSetting { field: &'static str, message: String },

    #[error("Practice mode requires an input port")]
    MissingInputPort,

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("No MIDI {0} ports available")]
    NoPorts(&'static str),

    #[error("MIDI backend error: {0}")]
    Backend(String),

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}

impl ClaveError {
    pub(crate) fn setting(field: &'static str, message: impl Into<String>) -> Self {
        ClaveError::InvalidSetting {
            field,
            message: message.into(),
        }
    }
}
