//! Rotation kernel
//!
//! Homogeneous rotations about the machine Z and Y axes, and the composed
//! transform that re-expresses a part-frame position in the frame of the
//! tilted and rotated table.

use cgmath::{Deg, Matrix4, Point3, Vector4};

/// Rotary axis angles in degrees: B tilts (beta), C rotates (gamma)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotaryAngles {
    pub beta: f64,
    pub gamma: f64,
}

impl RotaryAngles {
    pub const ZERO: RotaryAngles = RotaryAngles {
        beta: 0.0,
        gamma: 0.0,
    };

    pub fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma }
    }

    pub fn is_zero(&self) -> bool {
        self.beta == 0.0 && self.gamma == 0.0
    }
}

pub fn rotate_around_z(point: Vector4<f64>, degrees: f64) -> Vector4<f64> {
    Matrix4::from_angle_z(Deg(degrees)) * point
}

pub fn rotate_around_y(point: Vector4<f64>, degrees: f64) -> Vector4<f64> {
    Matrix4::from_angle_y(Deg(degrees)) * point
}

/// Express `point` in the rotated table frame.
///
/// Rotates by `gamma - 180` about Z, then by `beta` about Y, then mirrors X
/// and Y. The 180 degree offset and the mirror together put a zero rotation
/// back at the identity; both are part of the UMC table convention and the
/// order matters.
pub fn to_tool_frame(point: Point3<f64>, angles: RotaryAngles) -> Point3<f64> {
    let about_z = rotate_around_z(point.to_homogeneous(), angles.gamma - 180.0);
    let about_y = rotate_around_y(about_z, angles.beta);
    Point3::new(-about_y.x, -about_y.y, about_y.z)
}
