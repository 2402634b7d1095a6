/*
Clave Grid
==========

A grid divides the two-bar clave cycle into equal steps. Everything the
schedulers need (step length, cycle length, allowed onsets) is derived from
three inputs: tempo, resolution and which clave pattern is being played.

Bars are 4/4, so one bar is four beats:
    resolution 16 -> 4 steps per beat (sixteenth notes)
    resolution 8  -> 2 steps per beat (eighth notes)

Hit tables are authored at 16 steps per bar. The 8-step tables are derived by
halving each index and dropping duplicates.
*/

use std::str::FromStr;
use std::time::Duration;

use crate::error::ClaveError;

/// Beats per bar. The clave cycle is always counted in 4/4.
pub const BEATS_PER_BAR: u32 = 4;

/// Bars in one clave cycle.
pub const BARS_PER_CYCLE: u32 = 2;

const HITS_A_16: &[u32] = &[0, 6, 10, 16, 22, 26];
const HITS_B_16: &[u32] = &[0, 6, 10, 16, 22];

/// Steps per bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub enum Resolution {
    Eighth,
    Sixteenth,
}

impl Resolution {
    pub const fn steps_per_bar(self) -> u32 {
        match self {
            Resolution::Eighth => 8,
            Resolution::Sixteenth => 16,
        }
    }
}

impl TryFrom<u32> for Resolution {
    type Error = ClaveError;

    fn try_from(steps: u32) -> Result<Self, Self::Error> {
        match steps {
            8 => Ok(Resolution::Eighth),
            16 => Ok(Resolution::Sixteenth),
            other => Err(ClaveError::InvalidResolution(other)),
        }
    }
}

impl From<Resolution> for u32 {
    fn from(resolution: Resolution) -> Self {
        resolution.steps_per_bar()
    }
}

/// Canonical clave patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ClavePattern {
    /// Six hits over the cycle
    A,
    /// Five hits over the cycle
    B,
}

impl ClavePattern {
    fn hits_at_sixteen(self) -> &'static [u32] {
        match self {
            ClavePattern::A => HITS_A_16,
            ClavePattern::B => HITS_B_16,
        }
    }
}

impl FromStr for ClavePattern {
    type Err = ClaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(ClavePattern::A),
            "b" => Ok(ClavePattern::B),
            _ => Err(ClaveError::UnknownPattern(s.to_string())),
        }
    }
}

/// Immutable description of the rhythmic grid.
///
/// Only the inputs are stored. Derived values are recomputed on every call
/// so they can never disagree with the tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    tempo: f64,
    resolution: Resolution,
    pattern: ClavePattern,
}

impl GridSpec {
    /// Create a grid, rejecting tempos that are not positive and finite
    pub fn new(tempo: f64, resolution: Resolution, pattern: ClavePattern) -> Result<Self, ClaveError> {
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(ClaveError::InvalidTempo(tempo));
        }
        Ok(Self {
            tempo,
            resolution,
            pattern,
        })
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pattern(&self) -> ClavePattern {
        self.pattern
    }

    pub fn bars_per_cycle(&self) -> u32 {
        BARS_PER_CYCLE
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo
    }

    pub fn seconds_per_bar(&self) -> f64 {
        self.seconds_per_beat() * BEATS_PER_BAR as f64
    }

    pub fn seconds_per_step(&self) -> f64 {
        self.seconds_per_bar() / self.resolution.steps_per_bar() as f64
    }

    pub fn seconds_per_cycle(&self) -> f64 {
        self.seconds_per_bar() * BARS_PER_CYCLE as f64
    }

    pub fn steps_per_bar(&self) -> u32 {
        self.resolution.steps_per_bar()
    }

    pub fn steps_per_cycle(&self) -> u32 {
        self.steps_per_bar() * BARS_PER_CYCLE
    }

    /// Beats covered by a single step (0.25 at 16 steps per bar)
    pub fn beats_per_step(&self) -> f64 {
        BEATS_PER_BAR as f64 / self.steps_per_bar() as f64
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds_per_step())
    }

    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds_per_cycle())
    }

    /// Offset of `step` from the start of the cycle
    pub fn step_offset(&self, step: u32) -> Duration {
        Duration::from_secs_f64(self.seconds_per_step() * step as f64)
    }

    /// Sorted, de-duplicated clave onsets for this resolution
    pub fn hit_table(&self) -> Vec<u32> {
        let source = self.pattern.hits_at_sixteen();
        let divisor = Resolution::Sixteenth.steps_per_bar() / self.steps_per_bar();

        let mut hits: Vec<u32> = source.iter().map(|&step| step / divisor).collect();
        hits.dedup();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(resolution: Resolution, pattern: ClavePattern) -> GridSpec {
        GridSpec::new(120.0, resolution, pattern).unwrap()
    }

    #[test]
    fn test_derived_timing_at_120_bpm() {
        let g = grid(Resolution::Sixteenth, ClavePattern::A);

        assert_eq!(g.seconds_per_beat(), 0.5);
        assert_eq!(g.seconds_per_bar(), 2.0);
        assert_eq!(g.seconds_per_step(), 0.125);
        assert_eq!(g.seconds_per_cycle(), 4.0);
        assert_eq!(g.beats_per_step(), 0.25);
        assert_eq!(g.cycle_duration(), Duration::from_secs(4));
    }

    #[test]
    fn test_steps_per_cycle_is_resolution_times_bars() {
        for resolution in [Resolution::Eighth, Resolution::Sixteenth] {
            for pattern in [ClavePattern::A, ClavePattern::B] {
                let g = grid(resolution, pattern);
                assert_eq!(g.steps_per_cycle(), resolution.steps_per_bar() * 2);
                assert!(g.hit_table().iter().all(|&h| h < g.steps_per_cycle()));
            }
        }
    }

    #[test]
    fn test_hit_tables_at_sixteen() {
        assert_eq!(
            grid(Resolution::Sixteenth, ClavePattern::A).hit_table(),
            vec![0, 6, 10, 16, 22, 26]
        );
        assert_eq!(
            grid(Resolution::Sixteenth, ClavePattern::B).hit_table(),
            vec![0, 6, 10, 16, 22]
        );
    }

    #[test]
    fn test_hit_tables_halved_at_eight() {
        assert_eq!(
            grid(Resolution::Eighth, ClavePattern::A).hit_table(),
            vec![0, 3, 5, 8, 11, 13]
        );
        assert_eq!(
            grid(Resolution::Eighth, ClavePattern::B).hit_table(),
            vec![0, 3, 5, 8, 11]
        );
    }

    #[test]
    fn test_rejects_bad_tempo() {
        for tempo in [0.0, -90.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                GridSpec::new(tempo, Resolution::Sixteenth, ClavePattern::A),
                Err(ClaveError::InvalidTempo(_))
            ));
        }
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("A".parse::<ClavePattern>().unwrap(), ClavePattern::A);
        assert_eq!(" b ".parse::<ClavePattern>().unwrap(), ClavePattern::B);
        assert_eq!(
            "rumba".parse::<ClavePattern>(),
            Err(ClaveError::UnknownPattern("rumba".to_string()))
        );
        assert_eq!(Resolution::try_from(8).unwrap(), Resolution::Eighth);
        assert_eq!(Resolution::try_from(12), Err(ClaveError::InvalidResolution(12)));
    }
}
