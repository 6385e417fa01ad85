//! Vector math kernel: pure, stateless operations on 3-vectors.
//!
//! Every method takes `&self` and returns a new value; none of them mutate
//! the receiver. This module has no knowledge of sensors, calibration, or
//! fusion — it is the same kind of leaf utility a physics or graphics crate
//! would ship on its own.

use serde::{Deserialize, Serialize};

/// A 3D vector of accelerometer, gyroscope, or derived-quantity components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Vectors below this magnitude are treated as singular/degenerate by
/// `normalize` and `rotate` (guards against division by zero).
const NORM_EPSILON: f64 = 1e-5;

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn unit_x() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub fn unit_y() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or `self` unchanged if too short
    /// to normalize reliably.
    pub fn normalize(&self) -> Self {
        let n = self.norm();
        if n < NORM_EPSILON {
            *self
        } else {
            self.scale(1.0 / n)
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(&self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Angle to `other`, in radians, clamped to tolerate floating-point
    /// drift in the cosine argument (the Python original does not clamp
    /// and can panic/NaN on exactly-parallel or exactly-antiparallel
    /// vectors after repeated rotation; see SPEC_FULL.md §9).
    pub fn angle_to(&self, other: &Self) -> f64 {
        let denom = self.norm() * other.norm();
        if denom < NORM_EPSILON {
            return 0.0;
        }
        let cos_theta = (self.dot(other) / denom).clamp(-1.0, 1.0);
        cos_theta.acos()
    }

    /// Rodrigues rotation of `self` by `angle` radians around `axis`.
    ///
    /// Builds an orthonormal basis `(axis, u, w)` and rotates the
    /// components of `self` perpendicular to `axis`. If `axis` is too
    /// short to normalize, `self` is returned unchanged — this is the
    /// guard the source relies on to make small/zero gyro readings a
    /// no-op rather than a division by zero.
    pub fn rotate(&self, axis: &Self, angle: f64) -> Self {
        let axis_norm = axis.norm();
        if axis_norm < NORM_EPSILON {
            return *self;
        }
        let axis = axis.scale(1.0 / axis_norm);

        // Candidate perpendicular basis vector; falls back to a different
        // construction when axis is near the Z axis, where the first
        // candidate degenerates toward zero length.
        let mut u = Self::new(-axis.y, axis.x, 0.0);
        if u.norm() < 0.2 {
            u = Self::new(0.0, axis.z, -axis.y);
        }
        let u = u.normalize();
        let w = axis.cross(&u);

        let b_x = self.dot(&axis);
        let b_y = self.dot(&u);
        let b_z = self.dot(&w);

        let (sin_a, cos_a) = angle.sin_cos();
        let a_y = cos_a * b_y - sin_a * b_z;
        let a_z = cos_a * b_z + sin_a * b_y;

        axis.scale(b_x).add(&u.scale(a_y)).add(&w.scale(a_z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn norm_of_unit_axes() {
        assert!((Vector3::unit_x().norm() - 1.0).abs() < 1e-12);
        assert!((Vector3::unit_y().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cross_of_orthonormal_basis_is_right_handed() {
        let z = Vector3::unit_x().cross(&Vector3::unit_y());
        assert!((z.x).abs() < 1e-12);
        assert!((z.y).abs() < 1e-12);
        assert!((z.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotate_by_zero_angle_is_identity() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let axis = Vector3::unit_x();
        let r = v.rotate(&axis, 0.0);
        assert!((r.x - v.x).abs() < 1e-9);
        assert!((r.y - v.y).abs() < 1e-9);
        assert!((r.z - v.z).abs() < 1e-9);
    }

    #[test]
    fn rotate_by_full_turn_is_identity() {
        let v = Vector3::new(0.3, -0.7, 1.1);
        let axis = Vector3::new(0.2, 0.4, 0.9);
        let r = v.rotate(&axis, 2.0 * PI);
        assert!((r.x - v.x).abs() < 1e-6);
        assert!((r.y - v.y).abs() < 1e-6);
        assert!((r.z - v.z).abs() < 1e-6);
    }

    #[test]
    fn rotate_leaves_axis_fixed() {
        let axis = Vector3::new(0.0, 0.0, 1.0);
        let r = axis.rotate(&axis, 1.234);
        assert!((r.x - axis.x).abs() < 1e-9);
        assert!((r.y - axis.y).abs() < 1e-9);
        assert!((r.z - axis.z).abs() < 1e-9);
    }

    #[test]
    fn rotate_preserves_magnitude() {
        let v = Vector3::new(1.0, -2.0, 0.5);
        let axis = Vector3::new(0.1, 1.0, -0.3);
        let r = v.rotate(&axis, 0.77);
        assert!((r.norm() - v.norm()).abs() < 1e-9);
    }

    #[test]
    fn rotate_with_near_zero_axis_is_noop() {
        let v = Vector3::unit_x();
        let r = v.rotate(&Vector3::new(0.0, 0.0, 1e-7), PI / 2.0);
        assert!((r.x - v.x).abs() < 1e-9);
        assert!((r.y - v.y).abs() < 1e-9);
        assert!((r.z - v.z).abs() < 1e-9);
    }

    #[test]
    fn rotate_z_axis_quarter_turn() {
        let v = Vector3::new(0.0, 1.0, 0.0);
        let axis = Vector3::new(0.0, 0.0, 1.0);
        let r = v.rotate(&axis, PI / 2.0);
        assert!((r.x - (-1.0)).abs() < 1e-9);
        assert!(r.y.abs() < 1e-9);
        assert!(r.z.abs() < 1e-9);
    }

    #[test]
    fn angle_between_orthogonal_axes_is_right_angle() {
        let a = Vector3::unit_x();
        let b = Vector3::unit_y();
        assert!((a.angle_to(&b) - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn angle_between_clamps_drifted_cosine() {
        // Two nearly-identical vectors whose dot product, after fp error,
        // could exceed 1.0 before clamping.
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(1.0000000001, 0.0, 0.0);
        let theta = a.angle_to(&b);
        assert!(theta.is_finite());
        assert!(theta >= 0.0);
    }
}
