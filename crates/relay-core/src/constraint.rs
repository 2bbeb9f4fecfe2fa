use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Kinds of constraints between two bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Weld the bodies in their current relative pose.
    #[default]
    Lock,
    /// Same as lock; kept for hosts that name it this way.
    Fixed,
    /// Damped spring between the two pivots.
    Spring,
    /// Slide along an axis.
    Slider,
    /// Rotate around an axis.
    Hinge,
    /// Ball joint with a cone limit.
    ConeTwist,
    /// Keep the two pivots together.
    PointToPoint,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lock => "lock",
            Self::Fixed => "fixed",
            Self::Spring => "spring",
            Self::Slider => "slider",
            Self::Hinge => "hinge",
            Self::ConeTwist => "cone_twist",
            Self::PointToPoint => "point_to_point",
        };
        f.write_str(name)
    }
}

/// Options for `ADD_CONSTRAINT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintOptions {
    /// Constraint family.
    #[serde(rename = "type")]
    pub constraint: ConstraintKind,
    /// Anchor in the first body's frame.
    pub pivot: Vec3,
    /// Anchor in the target body's frame.
    pub target_pivot: Vec3,
    /// Axis in the first body's frame (hinge, slider).
    pub axis: Vec3,
    /// Axis in the target body's frame (hinge, slider).
    pub target_axis: Vec3,
    /// Spring stiffness.
    pub stiffness: f32,
    /// Spring damping.
    pub damping: f32,
}

impl Default for ConstraintOptions {
    fn default() -> Self {
        Self {
            constraint: ConstraintKind::Lock,
            pivot: Vec3::ZERO,
            target_pivot: Vec3::ZERO,
            axis: Vec3::Y,
            target_axis: Vec3::Y,
            stiffness: 100.0,
            damping: 1.0,
        }
    }
}

impl ConstraintOptions {
    /// Options of the given kind, everything else default.
    pub fn of_kind(constraint: ConstraintKind) -> Self {
        Self {
            constraint,
            ..Self::default()
        }
    }

    /// Reject values the engine cannot use.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.stiffness.is_finite() && self.stiffness >= 0.0) {
            return Err(CoreError::OutOfRange {
                field: "stiffness",
                value: self.stiffness,
                reason: "must be finite and non-negative",
            });
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(CoreError::OutOfRange {
                field: "damping",
                value: self.damping,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}
