//! Contact generation between shape proxies.
//!
//! Spheres are exact. Everything else is reduced to its world-space bounding
//! box, which is enough for a reference engine whose job is to produce
//! plausible manifolds, not accurate physics.

use glam::{Mat3, Vec3};
use relay_core::{Pose, ShapeDesc, ShapeGeom};

use crate::engine::ContactPoint;

/// A shape placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Proxy {
    Sphere { center: Vec3, radius: f32 },
    Aabb { center: Vec3, half: Vec3 },
}

impl Proxy {
    pub(crate) fn new(body: &Pose, shape: &ShapeDesc) -> Self {
        let placed = body.mul_pose(&shape.offset);
        match &shape.geom {
            ShapeGeom::Sphere { radius } => Self::Sphere {
                center: placed.translation,
                radius: *radius,
            },
            ShapeGeom::Points(points) => {
                let (min, max) = points.iter().fold(
                    (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                    |(lo, hi), p| (lo.min(*p), hi.max(*p)),
                );
                let local_center = if points.is_empty() {
                    Vec3::ZERO
                } else {
                    (min + max) * 0.5
                };
                Self::Aabb {
                    center: placed.transform_point(local_center),
                    half: rotated_half(&placed, shape.local_half_extents()),
                }
            }
            _ => Self::Aabb {
                center: placed.translation,
                half: rotated_half(&placed, shape.local_half_extents()),
            },
        }
    }

    pub(crate) fn center(&self) -> Vec3 {
        match self {
            Self::Sphere { center, .. } | Self::Aabb { center, .. } => *center,
        }
    }

    pub(crate) fn half_extents(&self) -> Vec3 {
        match self {
            Self::Sphere { radius, .. } => Vec3::splat(*radius),
            Self::Aabb { half, .. } => *half,
        }
    }
}

fn rotated_half(pose: &Pose, half: Vec3) -> Vec3 {
    let m = Mat3::from_quat(pose.rotation);
    Mat3::from_cols(m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs()) * half
}

/// Closest approach between two proxies, normal pointing from `a` to `b`.
pub(crate) fn contact(a: &Proxy, b: &Proxy) -> ContactPoint {
    if let (
        Proxy::Sphere {
            center: ca,
            radius: ra,
        },
        Proxy::Sphere {
            center: cb,
            radius: rb,
        },
    ) = (a, b)
    {
        let delta = *cb - *ca;
        let length = delta.length();
        let normal = if length > f32::EPSILON {
            delta / length
        } else {
            Vec3::Y
        };
        let distance = length - ra - rb;
        return ContactPoint {
            distance,
            position: *ca + normal * (ra + distance * 0.5),
            normal,
        };
    }

    let (ca, cb) = (a.center(), b.center());
    let delta = cb - ca;
    let overlap = a.half_extents() + b.half_extents() - delta.abs();
    // Shallowest overlap when penetrating, widest gap when apart.
    let axis = min_axis(overlap);
    let sign = if delta[axis] < 0.0 { -1.0 } else { 1.0 };
    let mut normal = Vec3::ZERO;
    normal[axis] = sign;

    let distance = if overlap.min_element() > 0.0 {
        -overlap[axis]
    } else {
        (-overlap).max(Vec3::ZERO).length()
    };
    ContactPoint {
        distance,
        position: (ca + cb) * 0.5,
        normal,
    }
}

fn min_axis(v: Vec3) -> usize {
    if v.x <= v.y && v.x <= v.z {
        0
    } else if v.y <= v.z {
        1
    } else {
        2
    }
}
