//! Circular interpolation direction
//!
//! CLSF circles carry a center and radius but the G02/G03 sense has to be
//! recovered from where the arc starts and ends around that center.

/// Quadrant of a point relative to the arc center.
/// Points on the X axis count as upper half, points on the Y axis as right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    First,
    Second,
    Third,
    Fourth,
}

impl Quadrant {
    pub fn of(dx: f64, dy: f64) -> Self {
        match (dx >= 0.0, dy >= 0.0) {
            (true, true) => Quadrant::First,
            (false, true) => Quadrant::Second,
            (false, false) => Quadrant::Third,
            (true, false) => Quadrant::Fourth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

impl ArcDirection {
    pub fn code(self) -> &'static str {
        match self {
            ArcDirection::Clockwise => "G02",
            ArcDirection::CounterClockwise => "G03",
        }
    }
}

/// Polar angle in degrees, [0, 360), of a center-relative point.
///
/// `dx / radius` is clamped before `acos` so points sitting a hair outside
/// the circle still resolve.
pub fn polar_angle(dx: f64, dy: f64, radius: f64) -> f64 {
    let angle = (dx / radius).clamp(-1.0, 1.0).acos().to_degrees();
    match Quadrant::of(dx, dy) {
        Quadrant::First | Quadrant::Second => angle,
        Quadrant::Third | Quadrant::Fourth => 360.0 - angle,
    }
}

/// Interpolation sense for an arc from `start` to `end` around `center`.
///
/// Clockwise when the end angle leads the start angle by half a turn or more.
/// Any other pair is counter-clockwise, so swapping the end points of an arc
/// shorter than half a turn does not reverse the result.
pub fn resolve_direction(
    start: (f64, f64),
    end: (f64, f64),
    center: (f64, f64),
    radius: f64,
) -> ArcDirection {
    let start_angle = polar_angle(start.0 - center.0, start.1 - center.1, radius);
    let end_angle = polar_angle(end.0 - center.0, end.1 - center.1, radius);

    if end_angle - start_angle >= 180.0 {
        ArcDirection::Clockwise
    } else {
        ArcDirection::CounterClockwise
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9, "expected {}, got {}", b, a);
    }

    #[test]
    fn test_quadrants_are_total() {
        assert_eq!(Quadrant::of(1.0, 1.0), Quadrant::First);
        assert_eq!(Quadrant::of(-1.0, 1.0), Quadrant::Second);
        assert_eq!(Quadrant::of(-1.0, -1.0), Quadrant::Third);
        assert_eq!(Quadrant::of(1.0, -1.0), Quadrant::Fourth);
        assert_eq!(Quadrant::of(0.0, 0.0), Quadrant::First);
        assert_eq!(Quadrant::of(-1.0, 0.0), Quadrant::Second);
        assert_eq!(Quadrant::of(0.0, -1.0), Quadrant::Fourth);
    }

    #[test]
    fn test_polar_angle() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        approx(polar_angle(1.0, 0.0, 1.0), 0.0);
        approx(polar_angle(s, s, 1.0), 45.0);
        approx(polar_angle(0.0, 1.0, 1.0), 90.0);
        approx(polar_angle(-1.0, 0.0, 1.0), 180.0);
        approx(polar_angle(-s, -s, 1.0), 225.0);
        approx(polar_angle(0.0, -1.0, 1.0), 270.0);
        approx(polar_angle(s, -s, 1.0), 315.0);
    }

    #[test]
    fn test_polar_angle_clamps_overshoot() {
        approx(polar_angle(1.0000001, 0.0, 1.0), 0.0);
        approx(polar_angle(-2.0, 0.0, 2.0 - 1e-9), 180.0);
    }

    #[test]
    fn test_half_circle_and_reverse() {
        let center = (0.0, 0.0);

        // 0 -> 180: end leads by exactly half a turn
        assert_eq!(
            resolve_direction((1.0, 0.0), (-1.0, 0.0), center, 1.0),
            ArcDirection::Clockwise
        );
        assert_eq!(
            resolve_direction((-1.0, 0.0), (1.0, 0.0), center, 1.0),
            ArcDirection::CounterClockwise
        );
    }

    #[test]
    fn test_quarter_arcs() {
        let center = (1.0, 1.0);

        // 90 -> 180 around an offset center
        assert_eq!(
            resolve_direction((1.0, 2.0), (0.0, 1.0), center, 1.0),
            ArcDirection::CounterClockwise
        );
        // 0 -> 270: the short way round is clockwise
        assert_eq!(
            resolve_direction((2.0, 1.0), (1.0, 0.0), center, 1.0),
            ArcDirection::Clockwise
        );
    }

    #[test]
    fn test_short_arc_is_counterclockwise_both_ways() {
        let center = (0.0, 0.0);

        // 90 -> 0 and 0 -> 90: neither lead reaches half a turn
        assert_eq!(
            resolve_direction((0.0, 1.0), (1.0, 0.0), center, 1.0),
            ArcDirection::CounterClockwise
        );
        assert_eq!(
            resolve_direction((1.0, 0.0), (0.0, 1.0), center, 1.0),
            ArcDirection::CounterClockwise
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ArcDirection::Clockwise.code(), "G02");
        assert_eq!(ArcDirection::CounterClockwise.code(), "G03");
    }
}
