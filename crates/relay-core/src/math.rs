//! Transform helpers shared by the worker and its engines.
//!
//! Buffer records store a full column-major 4×4 matrix, while engines only
//! understand rigid poses. [`Pose`] is the bridge: it splits a matrix into the
//! rigid part the engine owns and the scale the host owns.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::POSE_EPSILON;
use crate::error::{CoreError, CoreResult};

/// A rigid transform: translation plus unit rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-space position.
    pub translation: Vec3,
    /// World-space orientation.
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// The identity pose at the origin.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose from its parts.
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// A pose with only a translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Split a matrix into its rigid pose and its scale.
    pub fn from_matrix(matrix: &Mat4) -> (Self, Vec3) {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        (Self::new(translation, rotation.normalize()), scale)
    }

    /// Recompose a matrix from this pose and a scale.
    pub fn to_matrix(&self, scale: Vec3) -> Mat4 {
        Mat4::from_scale_rotation_translation(scale, self.rotation, self.translation)
    }

    /// Compare two poses within `epsilon`, treating `q` and `-q` as the same rotation.
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        vec3_approx_eq(self.translation, other.translation, epsilon)
            && quat_approx_eq(self.rotation, other.rotation, epsilon)
    }

    /// Compare with the default pose tolerance.
    pub fn same_as(&self, other: &Self) -> bool {
        self.approx_eq(other, POSE_EPSILON)
    }

    /// Transform a point from this pose's local frame into world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.translation + self.rotation * local
    }

    /// Compose two poses: `self` applied after `local`.
    pub fn mul_pose(&self, local: &Self) -> Self {
        Self::new(
            self.transform_point(local.translation),
            (self.rotation * local.rotation).normalize(),
        )
    }

    /// The inverse rigid transform.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self::new(rotation * -self.translation, rotation)
    }
}

/// One colored line segment produced by an engine's debug drawer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebugLine {
    /// Segment start, world space.
    pub from: Vec3,
    /// Segment end, world space.
    pub to: Vec3,
    /// RGB color in `0..=1`.
    pub color: Vec3,
}

/// Component-wise comparison within `epsilon`.
pub fn vec3_approx_eq(a: Vec3, b: Vec3, epsilon: f32) -> bool {
    (a - b).abs().max_element() < epsilon
}

/// Quaternion comparison within `epsilon`, accepting either sign.
pub fn quat_approx_eq(a: Quat, b: Quat, epsilon: f32) -> bool {
    let same = (a.x - b.x).abs() < epsilon
        && (a.y - b.y).abs() < epsilon
        && (a.z - b.z).abs() < epsilon
        && (a.w - b.w).abs() < epsilon;
    let flipped = (a.x + b.x).abs() < epsilon
        && (a.y + b.y).abs() < epsilon
        && (a.z + b.z).abs() < epsilon
        && (a.w + b.w).abs() < epsilon;
    same || flipped
}

/// Build a matrix from sixteen column-major values.
pub fn mat4_from_slice(values: &[f32]) -> CoreResult<Mat4> {
    if values.len() != 16 {
        return Err(CoreError::MalformedTransform(format!(
            "expected 16 elements, got {}",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
        return Err(CoreError::MalformedTransform(format!(
            "element {bad} is not finite"
        )));
    }
    Ok(Mat4::from_cols_slice(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_split_keeps_scale_apart() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.5));
        let matrix = pose.to_matrix(Vec3::splat(2.0));
        let (back, scale) = Pose::from_matrix(&matrix);
        assert!(back.same_as(&pose));
        assert!(vec3_approx_eq(scale, Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn negated_quaternion_is_same_rotation() {
        let q = Quat::from_rotation_x(1.0);
        assert!(quat_approx_eq(q, -q, POSE_EPSILON));
        assert!(!quat_approx_eq(q, Quat::IDENTITY, POSE_EPSILON));
    }

    #[test]
    fn inverse_composes_to_identity() {
        let pose = Pose::new(Vec3::new(4.0, -1.0, 0.5), Quat::from_rotation_z(1.2));
        let id = pose.mul_pose(&pose.inverse());
        assert!(id.same_as(&Pose::IDENTITY));
    }

    #[test]
    fn matrix_slice_validation() {
        assert!(mat4_from_slice(&[0.0; 15]).is_err());
        let mut values = Mat4::IDENTITY.to_cols_array();
        assert_eq!(mat4_from_slice(&values).unwrap(), Mat4::IDENTITY);
        values[5] = f32::NAN;
        assert!(matches!(
            mat4_from_slice(&values),
            Err(CoreError::MalformedTransform(_))
        ));
    }
}
