//! Step quantization against the clave grid.
//!
//! Positions are fractional step indices within one cycle. All results wrap
//! modulo the cycle length, so a position just below the end of the cycle can
//! round forward onto step 0.

use std::str::FromStr;

use crate::error::ClaveError;

/// Positions closer than this to an integer are treated as that integer.
/// Keeps float error in `elapsed / seconds_per_step` from pushing an exact
/// grid time onto the neighbouring step under floor or ceil.
const SNAP_EPSILON: f64 = 1e-9;

/// Rounding policy used when mapping a position onto a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RoundingMode {
    /// Round half up
    #[default]
    Nearest,
    Floor,
    Ceil,
}

impl FromStr for RoundingMode {
    type Err = ClaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(RoundingMode::Nearest),
            "floor" => Ok(RoundingMode::Floor),
            "ceil" => Ok(RoundingMode::Ceil),
            _ => Err(ClaveError::UnknownRounding(s.to_string())),
        }
    }
}

/// Round `position` without wrapping. Can return `steps_per_cycle` or a
/// negative index; callers that need the due time of the chosen occurrence
/// use this directly.
pub fn round_position(position: f64, mode: RoundingMode) -> i64 {
    let nearest_integer = position.round();
    if (position - nearest_integer).abs() < SNAP_EPSILON {
        return nearest_integer as i64;
    }

    match mode {
        RoundingMode::Nearest => (position + 0.5).floor() as i64,
        RoundingMode::Floor => position.floor() as i64,
        RoundingMode::Ceil => position.ceil() as i64,
    }
}

/// Map a fractional step position to a step index in `[0, steps_per_cycle)`
pub fn quantize(position: f64, steps_per_cycle: u32, mode: RoundingMode) -> u32 {
    wrap_step(round_position(position, mode), steps_per_cycle)
}

/// Wrap an unbounded step index into the cycle
pub fn wrap_step(step: i64, steps_per_cycle: u32) -> u32 {
    step.rem_euclid(steps_per_cycle as i64) as u32
}

/// Whether an onset at `step` is acceptable. Every step is allowed when
/// `strict` is off.
pub fn is_allowed(step: u32, hit_table: &[u32], strict: bool) -> bool {
    !strict || hit_table.contains(&step)
}

/// Nearest clave hit to a position, looking across the cycle boundary.
///
/// Returns the hit and the signed offset in steps from `position` to that hit
/// (negative when the hit lies earlier). Equal distances resolve to the hit
/// with the lower step index.
pub fn nearest_hit(position: f64, hit_table: &[u32], steps_per_cycle: u32) -> Option<(u32, f64)> {
    let cycle = steps_per_cycle as f64;
    let mut best: Option<(u32, f64)> = None;

    for &hit in hit_table {
        let offset = signed_offset(position, hit as f64, cycle);
        let closer = match best {
            None => true,
            Some((best_hit, best_offset)) => {
                let distance = offset.abs();
                let best_distance = best_offset.abs();
                if (distance - best_distance).abs() < SNAP_EPSILON {
                    hit < best_hit
                } else {
                    distance < best_distance
                }
            }
        };
        if closer {
            best = Some((hit, offset));
        }
    }

    best
}

/// Shortest signed distance from `from` to `to` on a circle of length `cycle`.
/// Result lies in `(-cycle / 2, cycle / 2]`.
fn signed_offset(from: f64, to: f64, cycle: f64) -> f64 {
    let forward = (to - from).rem_euclid(cycle);
    if forward > cycle / 2.0 {
        forward - cycle
    } else {
        forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HITS_A: &[u32] = &[0, 6, 10, 16, 22, 26];
    const MODES: [RoundingMode; 3] = [RoundingMode::Nearest, RoundingMode::Floor, RoundingMode::Ceil];

    #[test]
    fn test_integer_positions_are_fixed_points() {
        for mode in MODES {
            for step in 0..32 {
                assert_eq!(quantize(step as f64, 32, mode), step);
            }
        }
    }

    #[test]
    fn test_float_error_near_integer_does_not_leak() {
        // 0.75 s / 0.125 s can land a hair off 6.0
        let position = 0.75_f64 / 0.125 - 1e-12;
        for mode in MODES {
            assert_eq!(quantize(position, 32, mode), 6);
        }
        let position = 6.0 + 1e-12;
        assert_eq!(quantize(position, 32, RoundingMode::Ceil), 6);
    }

    #[test]
    fn test_rounding_modes() {
        assert_eq!(quantize(6.4, 32, RoundingMode::Nearest), 6);
        assert_eq!(quantize(6.5, 32, RoundingMode::Nearest), 7);
        assert_eq!(quantize(6.6, 32, RoundingMode::Floor), 6);
        assert_eq!(quantize(6.1, 32, RoundingMode::Ceil), 7);
    }

    #[test]
    fn test_wraps_at_cycle_end() {
        assert_eq!(quantize(31.7, 32, RoundingMode::Nearest), 0);
        assert_eq!(quantize(31.2, 32, RoundingMode::Ceil), 0);
        assert_eq!(quantize(31.9, 32, RoundingMode::Floor), 31);
        assert_eq!(round_position(31.7, RoundingMode::Nearest), 32);
    }

    #[test]
    fn test_is_allowed() {
        assert!(is_allowed(6, HITS_A, true));
        assert!(!is_allowed(7, HITS_A, true));
        assert!(is_allowed(7, HITS_A, false));
    }

    #[test]
    fn test_nearest_hit_linear() {
        assert_eq!(nearest_hit(8.0, HITS_A, 32), Some((6, -2.0)));
        assert_eq!(nearest_hit(12.0, HITS_A, 32), Some((10, -2.0)));
        assert_eq!(nearest_hit(14.5, HITS_A, 32), Some((16, 1.5)));
    }

    #[test]
    fn test_nearest_hit_tie_prefers_lower_step() {
        assert_eq!(nearest_hit(3.0, HITS_A, 32), Some((0, -3.0)));
        assert_eq!(nearest_hit(8.0, &[6, 10], 32), Some((6, -2.0)));
    }

    #[test]
    fn test_nearest_hit_wraps_across_cycle_boundary() {
        // 30 is 4 from 26 but only 2 from the next cycle's step 0
        assert_eq!(nearest_hit(30.0, HITS_A, 32), Some((0, 2.0)));
        // 1 is closer to 0 than to 6
        assert_eq!(nearest_hit(1.0, HITS_A, 32), Some((0, -1.0)));
        // with only late hits, a position near 0 looks backwards
        assert_eq!(nearest_hit(1.0, &[10, 28], 32), Some((28, -5.0)));
    }

    #[test]
    fn test_nearest_hit_empty_table() {
        assert_eq!(nearest_hit(3.0, &[], 32), None);
    }

    #[test]
    fn test_parse_rounding() {
        assert_eq!("Floor".parse::<RoundingMode>().unwrap(), RoundingMode::Floor);
        assert!("banker".parse::<RoundingMode>().is_err());
    }
}
