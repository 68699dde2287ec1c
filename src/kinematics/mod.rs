//! Rotary solver for the B/C table
//!
//! Finds the tilt (B, beta) and rotation (C, gamma) that bring the table to a
//! requested tool-axis direction, keeping B inside its travel.

use crate::ast::is_vertical;
use crate::geometry::RotaryAngles;
use crate::machine::TravelLimits;
use cgmath::{InnerSpace, Vector3};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("tool axis ({i}, {j}, {k}) has no rotary solution")]
    DegenerateOrientation { i: f64, j: f64, k: f64 },

    #[error("B{beta:.4} is outside B-axis travel [{min}, {max}] even after flipping C")]
    UnresolvedTravelLimit { beta: f64, min: f64, max: f64 },
}

/// Solve B/C for a tool-axis direction.
pub fn solve_rotary(
    direction: Vector3<f64>,
    limits: &TravelLimits,
) -> Result<RotaryAngles, KinematicsError> {
    let degenerate = || KinematicsError::DegenerateOrientation {
        i: direction.x,
        j: direction.y,
        k: direction.z,
    };

    if is_vertical(&direction) {
        return Ok(RotaryAngles::ZERO);
    }
    if !(direction.x.is_finite() && direction.y.is_finite() && direction.z.is_finite())
        || direction.magnitude2() == 0.0
    {
        return Err(degenerate());
    }

    let (x, y, z) = (direction.x, direction.y, direction.z);

    let raw = if x == 0.0 && z == 0.0 {
        // Tool axis along Y: tilt is undefined, the table convention fixes it
        RotaryAngles::new(90.0, 90.0)
    } else if x == 0.0 {
        if z == 0.0 {
            return Err(degenerate());
        }
        let gamma = if y < 0.0 { -90.0 } else { 90.0 };
        let beta = (y / z).atan().to_degrees().abs();
        RotaryAngles::new(beta, gamma)
    } else {
        let gamma = (y / x).atan().to_degrees();
        let xy = x.hypot(y);
        let beta_prime = (z / xy).atan().to_degrees().abs();
        let beta = if x < 0.0 { beta_prime - 90.0 } else { 90.0 - beta_prime };
        RotaryAngles::new(beta, gamma)
    };

    correct_for_travel(raw, limits)
}

/// Bring B into travel by tilting the other way and turning C half a turn.
fn correct_for_travel(
    angles: RotaryAngles,
    limits: &TravelLimits,
) -> Result<RotaryAngles, KinematicsError> {
    if limits.contains(angles.beta) {
        return Ok(angles);
    }

    let flipped = RotaryAngles::new(-angles.beta, normalize_degrees(angles.gamma - 180.0));
    if limits.contains(flipped.beta) {
        Ok(flipped)
    } else {
        Err(KinematicsError::UnresolvedTravelLimit {
            beta: angles.beta,
            min: limits.min,
            max: limits.max,
        })
    }
}

/// Wrap an angle into (-180, 180].
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::to_tool_frame;
    use cgmath::Point3;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-6, "expected {:.6}, got {:.6}", b, a);
    }

    fn solve(x: f64, y: f64, z: f64) -> RotaryAngles {
        solve_rotary(Vector3::new(x, y, z), &TravelLimits::default()).expect("solve failed")
    }

    #[test]
    fn test_vertical_is_zero() {
        let angles = solve(0.0, 0.0, 1.0);
        assert_eq!(angles, RotaryAngles::ZERO);

        let point = Point3::new(3.0, -2.0, 1.5);
        let rotated = to_tool_frame(point, angles);
        approx(rotated.x, point.x);
        approx(rotated.y, point.y);
        approx(rotated.z, point.z);
    }

    #[test]
    fn test_axis_along_y() {
        assert_eq!(solve(0.0, 1.0, 0.0), RotaryAngles::new(90.0, 90.0));
        assert_eq!(solve(0.0, -1.0, 0.0), RotaryAngles::new(90.0, 90.0));
    }

    #[test]
    fn test_yz_plane() {
        let s = std::f64::consts::FRAC_1_SQRT_2;

        let angles = solve(0.0, s, s);
        approx(angles.beta, 45.0);
        approx(angles.gamma, 90.0);

        let angles = solve(0.0, -s, s);
        approx(angles.beta, 45.0);
        approx(angles.gamma, -90.0);
    }

    #[test]
    fn test_general_direction() {
        let s = std::f64::consts::FRAC_1_SQRT_2;

        let angles = solve(s, 0.0, s);
        approx(angles.beta, 45.0);
        approx(angles.gamma, 0.0);

        // Equal x/y components: C at 45, B from the 1:1:sqrt(2) split
        let d = Vector3::new(0.5, 0.5, s);
        let angles = solve(d.x, d.y, d.z);
        approx(angles.gamma, 45.0);
        approx(angles.beta, 45.0);
    }

    #[test]
    fn test_negative_x_within_travel() {
        // B at -30 is reachable as-is
        let beta = 30f64.to_radians();
        let angles = solve(-beta.sin(), 0.0, beta.cos());
        approx(angles.beta, -30.0);
        approx(angles.gamma, 0.0);
    }

    #[test]
    fn test_travel_correction_flips_b_and_c() {
        // Raw solution is B-60, C0: out of travel, so tilt the other way
        let beta = 60f64.to_radians();
        let angles = solve(-beta.sin(), 0.0, beta.cos());
        approx(angles.beta, 60.0);
        approx(angles.gamma, 180.0);

        // Raw C of 30 becomes -150 after the flip
        let d = Vector3::new(-0.75, -0.75 * 30f64.to_radians().tan(), 0.5);
        let angles = solve(d.x, d.y, d.z);
        assert!(angles.beta > 35.0);
        approx(angles.gamma, -150.0);
    }

    #[test]
    fn test_unresolved_travel_limit() {
        let narrow = TravelLimits { min: -10.0, max: 10.0 };
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let err = solve_rotary(Vector3::new(s, 0.0, s), &narrow).unwrap_err();

        assert!(matches!(err, KinematicsError::UnresolvedTravelLimit { .. }));
    }

    #[test]
    fn test_degenerate_direction() {
        let limits = TravelLimits::default();
        assert!(matches!(
            solve_rotary(Vector3::new(f64::NAN, 0.0, 1.0), &limits),
            Err(KinematicsError::DegenerateOrientation { .. })
        ));
        // No direction at all
        assert!(matches!(
            solve_rotary(Vector3::new(0.0, 0.0, 0.0), &limits),
            Err(KinematicsError::DegenerateOrientation { .. })
        ));
    }

    #[test]
    fn test_normalize_degrees() {
        approx(normalize_degrees(-200.0), 160.0);
        approx(normalize_degrees(-180.0), 180.0);
        approx(normalize_degrees(270.0), -90.0);
        approx(normalize_degrees(-90.0), -90.0);
        approx(normalize_degrees(180.0), 180.0);
    }
}
