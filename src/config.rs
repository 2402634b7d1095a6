//! Session configuration.
//!
//! [`RuntimeSpec`] is the validated, read-only configuration a loop runs
//! with. Build it fluently with [`RuntimeSpec::builder`], or from the flat
//! [`RuntimeConfig`] that mirrors the external configuration file.

use std::time::Duration;

use crate::error::ClaveError;
use crate::sequencing::bridge::NoteSpan;
use crate::sequencing::grid::{ClavePattern, GridSpec, Resolution};
use crate::sequencing::notes::{CLAVES, PERCUSSION_CHANNEL};
use crate::sequencing::quantize::RoundingMode;

/// Release windows never drop below this
pub const MIN_RELEASE_WINDOW_MS: f64 = 80.0;

/// Release windows default to this multiple of the base window
pub const RELEASE_WINDOW_FACTOR: f64 = 4.0;

/// Polling behaviour shared by both loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSpec {
    /// How far ahead of its due time an event may be sent
    pub lookahead: Duration,
    /// Sleep between polls
    pub poll_interval: Duration,
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl SchedulerSpec {
    /// Events further behind than this are stale
    pub fn stale_after(&self) -> Duration {
        self.lookahead + self.poll_interval
    }
}

/// Practice-mode lock rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeSpec {
    /// Only clave hits are valid onset positions
    pub strict: bool,
    /// Base tolerance window in milliseconds
    pub window_ms: f64,
    pub onset_window_ms: Option<f64>,
    pub release_window_ms: Option<f64>,
    pub rounding: RoundingMode,
    /// Drop off-grid onsets instead of snapping them
    pub reject_off_grid: bool,
}

impl Default for PracticeSpec {
    fn default() -> Self {
        Self {
            strict: true,
            window_ms: 30.0,
            onset_window_ms: None,
            release_window_ms: None,
            rounding: RoundingMode::Nearest,
            reject_off_grid: false,
        }
    }
}

impl PracticeSpec {
    pub fn onset_window_ms(&self) -> f64 {
        self.onset_window_ms.unwrap_or(self.window_ms)
    }

    /// Releases get a looser window than onsets unless overridden
    pub fn release_window_ms(&self) -> f64 {
        self.release_window_ms
            .unwrap_or_else(|| (self.window_ms * RELEASE_WINDOW_FACTOR).max(MIN_RELEASE_WINDOW_MS))
    }
}

/// Audible click on the clave hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickSpec {
    pub enabled: bool,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    /// Velocity on the first step of the cycle
    pub accent_velocity: u8,
}

impl Default for ClickSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: PERCUSSION_CHANNEL,
            key: CLAVES,
            velocity: 96,
            accent_velocity: 120,
        }
    }
}

/// Bar-boundary progress messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySpec {
    pub enabled: bool,
    pub channel: u8,
    /// Controller carrying bars remaining
    pub countdown_cc: u8,
    /// Controller carrying the running bar index
    pub bar_cc: u8,
}

impl Default for TelemetrySpec {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: 15,
            countdown_cc: 20,
            bar_cc: 21,
        }
    }
}

/// Validated configuration for one session
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSpec {
    pub grid: GridSpec,
    pub scheduler: SchedulerSpec,
    pub practice: PracticeSpec,
    pub click: ClickSpec,
    pub telemetry: TelemetrySpec,
    /// Stop after this many cycles; `None` runs until interrupted
    pub max_cycles: Option<u32>,
}

impl RuntimeSpec {
    pub fn builder(tempo: f64) -> RuntimeSpecBuilder {
        RuntimeSpecBuilder::new(tempo)
    }
}

/// Fluent builder for [`RuntimeSpec`]. Nothing is checked until `build`.
#[derive(Debug, Clone)]
pub struct RuntimeSpecBuilder {
    tempo: f64,
    resolution: Resolution,
    pattern: ClavePattern,
    scheduler: SchedulerSpec,
    practice: PracticeSpec,
    click: ClickSpec,
    telemetry: TelemetrySpec,
    max_cycles: Option<u32>,
}

impl RuntimeSpecBuilder {
    fn new(tempo: f64) -> Self {
        Self {
            tempo,
            resolution: Resolution::Sixteenth,
            pattern: ClavePattern::A,
            scheduler: SchedulerSpec::default(),
            practice: PracticeSpec::default(),
            click: ClickSpec::default(),
            telemetry: TelemetrySpec::default(),
            max_cycles: None,
        }
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn pattern(mut self, pattern: ClavePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn lookahead(mut self, lookahead: Duration) -> Self {
        self.scheduler.lookahead = lookahead;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.scheduler.poll_interval = poll_interval;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.practice.strict = strict;
        self
    }

    pub fn window_ms(mut self, window_ms: f64) -> Self {
        self.practice.window_ms = window_ms;
        self
    }

    pub fn onset_window_ms(mut self, window_ms: f64) -> Self {
        self.practice.onset_window_ms = Some(window_ms);
        self
    }

    pub fn release_window_ms(mut self, window_ms: f64) -> Self {
        self.practice.release_window_ms = Some(window_ms);
        self
    }

    pub fn rounding(mut self, rounding: RoundingMode) -> Self {
        self.practice.rounding = rounding;
        self
    }

    pub fn reject_off_grid(mut self, reject: bool) -> Self {
        self.practice.reject_off_grid = reject;
        self
    }

    pub fn click(mut self, click: ClickSpec) -> Self {
        self.click = click;
        self
    }

    pub fn telemetry(mut self, telemetry: TelemetrySpec) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn build(self) -> Result<RuntimeSpec, ClaveError> {
        let grid = GridSpec::new(self.tempo, self.resolution, self.pattern)?;

        if self.scheduler.poll_interval.is_zero() {
            return Err(ClaveError::setting("poll_interval", "must be greater than zero"));
        }

        check_window("window_ms", Some(self.practice.window_ms))?;
        check_window("onset_window_ms", self.practice.onset_window_ms)?;
        check_window("release_window_ms", self.practice.release_window_ms)?;

        check_channel("click.channel", self.click.channel)?;
        check_data("click.key", self.click.key)?;
        check_data("click.velocity", self.click.velocity)?;
        check_data("click.accent_velocity", self.click.accent_velocity)?;

        check_channel("telemetry.channel", self.telemetry.channel)?;
        check_data("telemetry.countdown_cc", self.telemetry.countdown_cc)?;
        check_data("telemetry.bar_cc", self.telemetry.bar_cc)?;
        if self.telemetry.enabled && self.telemetry.countdown_cc == self.telemetry.bar_cc {
            return Err(ClaveError::setting(
                "telemetry.bar_cc",
                "must differ from telemetry.countdown_cc",
            ));
        }

        if self.max_cycles == Some(0) {
            return Err(ClaveError::setting("max_cycles", "must be at least 1"));
        }

        Ok(RuntimeSpec {
            grid,
            scheduler: self.scheduler,
            practice: self.practice,
            click: self.click,
            telemetry: self.telemetry,
            max_cycles: self.max_cycles,
        })
    }
}

fn check_window(field: &'static str, window_ms: Option<f64>) -> Result<(), ClaveError> {
    match window_ms {
        Some(ms) if !ms.is_finite() || ms < 0.0 => Err(ClaveError::setting(
            field,
            format!("{ms} ms is not a non-negative number of milliseconds"),
        )),
        _ => Ok(()),
    }
}

fn check_channel(field: &'static str, channel: u8) -> Result<(), ClaveError> {
    if channel > 15 {
        return Err(ClaveError::setting(field, format!("channel {channel} is outside 0..=15")));
    }
    Ok(())
}

fn check_data(field: &'static str, value: u8) -> Result<(), ClaveError> {
    if value > 127 {
        return Err(ClaveError::setting(field, format!("{value} is outside 0..=127")));
    }
    Ok(())
}

fn millis(field: &'static str, ms: f64) -> Result<Duration, ClaveError> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(ClaveError::setting(field, format!("{ms} ms is not a valid duration")));
    }
    Ok(Duration::from_micros((ms * 1000.0).round() as u64))
}

/// Flat, file-friendly form of the session configuration.
///
/// Enumerations are kept as strings/integers so an unknown value surfaces as
/// a [`ClaveError`] from `RuntimeSpec::try_from` rather than a parse error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct RuntimeConfig {
    pub tempo: f64,
    pub resolution: u32,
    pub clave: String,
    pub strict: bool,
    pub window_ms: f64,
    pub onset_window_ms: Option<f64>,
    pub release_window_ms: Option<f64>,
    pub rounding: String,
    pub reject_off_grid: bool,
    pub click: bool,
    pub click_channel: u8,
    pub click_key: u8,
    pub click_velocity: u8,
    pub click_accent_velocity: u8,
    pub telemetry: bool,
    pub telemetry_channel: u8,
    pub countdown_cc: u8,
    pub bar_cc: u8,
    pub max_cycles: Option<u32>,
    pub lookahead_ms: f64,
    pub poll_ms: f64,
    pub output_port: Option<String>,
    pub input_port: Option<String>,
    /// Notes to loop in playback mode
    pub pattern: Vec<NoteSpan>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let scheduler = SchedulerSpec::default();
        let practice = PracticeSpec::default();
        let click = ClickSpec::default();
        let telemetry = TelemetrySpec::default();

        Self {
            tempo: 120.0,
            resolution: 16,
            clave: "a".to_string(),
            strict: practice.strict,
            window_ms: practice.window_ms,
            onset_window_ms: None,
            release_window_ms: None,
            rounding: "nearest".to_string(),
            reject_off_grid: practice.reject_off_grid,
            click: click.enabled,
            click_channel: click.channel,
            click_key: click.key,
            click_velocity: click.velocity,
            click_accent_velocity: click.accent_velocity,
            telemetry: telemetry.enabled,
            telemetry_channel: telemetry.channel,
            countdown_cc: telemetry.countdown_cc,
            bar_cc: telemetry.bar_cc,
            max_cycles: None,
            lookahead_ms: scheduler.lookahead.as_micros() as f64 / 1000.0,
            poll_ms: scheduler.poll_interval.as_micros() as f64 / 1000.0,
            output_port: None,
            input_port: None,
            pattern: Vec::new(),
        }
    }
}

impl TryFrom<&RuntimeConfig> for RuntimeSpec {
    type Error = ClaveError;

    fn try_from(config: &RuntimeConfig) -> Result<Self, Self::Error> {
        let mut builder = RuntimeSpec::builder(config.tempo)
            .resolution(Resolution::try_from(config.resolution)?)
            .pattern(config.clave.parse()?)
            .lookahead(millis("lookahead_ms", config.lookahead_ms)?)
            .poll_interval(millis("poll_ms", config.poll_ms)?)
            .strict(config.strict)
            .window_ms(config.window_ms)
            .rounding(config.rounding.parse()?)
            .reject_off_grid(config.reject_off_grid)
            .click(ClickSpec {
                enabled: config.click,
                channel: config.click_channel,
                key: config.click_key,
                velocity: config.click_velocity,
                accent_velocity: config.click_accent_velocity,
            })
            .telemetry(TelemetrySpec {
                enabled: config.telemetry,
                channel: config.telemetry_channel,
                countdown_cc: config.countdown_cc,
                bar_cc: config.bar_cc,
            });

        if let Some(ms) = config.onset_window_ms {
            builder = builder.onset_window_ms(ms);
        }
        if let Some(ms) = config.release_window_ms {
            builder = builder.release_window_ms(ms);
        }
        if let Some(cycles) = config.max_cycles {
            builder = builder.max_cycles(cycles);
        }

        builder.build()
    }
}

impl TryFrom<RuntimeConfig> for RuntimeSpec {
    type Error = ClaveError;

    fn try_from(config: RuntimeConfig) -> Result<Self, Self::Error> {
        RuntimeSpec::try_from(&config)
    }
}
