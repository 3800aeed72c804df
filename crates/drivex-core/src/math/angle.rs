//! Angle arithmetic for heading control
//!
//! All angles are in degrees. Gyro headings are continuous (they keep
//! counting past 360 rather than wrapping), so every comparison against a
//! target goes through [`shortest_error`] to stay on the short arc.

/// Normalize an angle to `[0, 360)`.
///
/// Total over all finite inputs, including large negatives.
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

/// Signed minimal rotation from `current` to `target`, in `(-180, 180]`.
///
/// Positive means turn counter-clockwise (toward increasing heading).
/// `current + shortest_error(target, current)` is congruent to `target`
/// modulo 360.
///
/// # Example
/// ```
/// use drivex_core::math::shortest_error;
///
/// // From 170° to 0° the short arc is backwards, not +190° forwards.
/// assert_eq!(shortest_error(0.0, 170.0), -170.0);
/// ```
#[inline]
pub fn shortest_error(target: f64, current: f64) -> f64 {
    let diff = normalize_degrees(target - current);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Shortest rotation expressed as a relative turn command, in `[-180, 180)`.
///
/// A drivebase `turn(angle)` is relative to wherever the robot currently
/// points; this converts an absolute target into that frame. The wrapped
/// branch (`deg - 360`) is taken as soon as the modulo result reaches a half
/// circle, so the commanded turn never exceeds 180 degrees. Note the
/// boundary differs from [`shortest_error`]: a dead-ahead-reversed target
/// maps to `-180`, not `+180`.
#[inline]
pub fn relative_turn(target_absolute: f64, start_absolute: f64) -> f64 {
    let deg = normalize_degrees(target_absolute - start_absolute);
    if deg >= 180.0 {
        deg - 360.0
    } else {
        deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_degrees() {
        assert_relative_eq!(normalize_degrees(0.0), 0.0);
        assert_relative_eq!(normalize_degrees(360.0), 0.0);
        assert_relative_eq!(normalize_degrees(-90.0), 270.0);
        assert_relative_eq!(normalize_degrees(725.0), 5.0);
        assert_relative_eq!(normalize_degrees(-725.0), 355.0);
    }

    #[test]
    fn test_shortest_error_range_and_congruence() {
        let mut angle = 0.0;
        while angle < 360.0 {
            let mut target = 0.0;
            while target < 360.0 {
                let e = shortest_error(target, angle);
                assert!(e > -180.0 && e <= 180.0, "error {} out of range", e);
                let reached = normalize_degrees(angle + e);
                assert_relative_eq!(reached, normalize_degrees(target), epsilon = 1e-9);
                target += 7.5;
            }
            angle += 7.5;
        }
    }

    #[test]
    fn test_shortest_error_antisymmetry() {
        // Antisymmetric except at the ±180 boundary.
        for (a, b) in [(10.0, 50.0), (350.0, 20.0), (0.0, 170.0), (90.0, 271.0)] {
            assert_relative_eq!(shortest_error(a, b), -shortest_error(b, a), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_shortest_error_picks_short_arc() {
        assert_relative_eq!(shortest_error(0.0, 170.0), -170.0);
        assert_relative_eq!(shortest_error(0.0, 190.0), 170.0);
        assert_relative_eq!(shortest_error(350.0, 10.0), -20.0);
        assert_relative_eq!(shortest_error(10.0, 350.0), 20.0);
    }

    #[test]
    fn test_shortest_error_boundary() {
        // Exactly opposed headings resolve to +180, never -180.
        assert_relative_eq!(shortest_error(180.0, 0.0), 180.0);
        assert_relative_eq!(shortest_error(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_shortest_error_unwrapped_inputs() {
        // Continuous gyro values far outside [0, 360) normalize first.
        assert_relative_eq!(shortest_error(90.0, 720.0), 90.0);
        assert_relative_eq!(shortest_error(-270.0, 0.0), 90.0);
    }

    #[test]
    fn test_relative_turn() {
        assert_relative_eq!(relative_turn(90.0, 0.0), 90.0);
        assert_relative_eq!(relative_turn(270.0, 0.0), -90.0);
        assert_relative_eq!(relative_turn(0.0, 170.0), -170.0);
        // Half circle takes the wrapped-negative branch.
        assert_relative_eq!(relative_turn(180.0, 0.0), -180.0);
    }
}
