use std::fmt;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::math::Pose;

/// Collision shape families accepted on the control channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Axis-aligned box in the body frame.
    #[default]
    Box,
    /// Y-aligned cylinder.
    Cylinder,
    /// Sphere.
    Sphere,
    /// Y-aligned capsule.
    Capsule,
    /// Y-aligned cone.
    Cone,
    /// Convex hull of the supplied vertices.
    Hull,
    /// Approximate convex decomposition (HACD).
    Hacd,
    /// Volumetric convex decomposition (V-HACD).
    Vhacd,
    /// Triangle mesh. Static bodies only.
    Mesh,
    /// Height field terrain.
    Heightfield,
}

impl ShapeKind {
    /// Whether this kind is built from raw vertices rather than primitive sizes.
    pub fn is_point_based(self) -> bool {
        matches!(
            self,
            Self::Hull | Self::Hacd | Self::Vhacd | Self::Mesh | Self::Heightfield
        )
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Box => "box",
            Self::Cylinder => "cylinder",
            Self::Sphere => "sphere",
            Self::Capsule => "capsule",
            Self::Cone => "cone",
            Self::Hull => "hull",
            Self::Hacd => "hacd",
            Self::Vhacd => "vhacd",
            Self::Mesh => "mesh",
            Self::Heightfield => "heightfield",
        };
        f.write_str(name)
    }
}

/// How shape dimensions are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    /// Fit the shape around the supplied geometry.
    #[default]
    All,
    /// Use the explicit sizes in [`ShapeOptions`].
    Manual,
}

/// Host-side description of a shape to attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeOptions {
    /// Shape family.
    #[serde(rename = "type")]
    pub shape: ShapeKind,
    /// Automatic or manual sizing.
    pub fit: Fit,
    /// Box half extents (manual fit).
    pub half_extents: Option<Vec3>,
    /// Sphere, cylinder, capsule, or cone radius (manual fit).
    pub radius: Option<f32>,
    /// Full height of a cylinder, capsule, or cone (manual fit).
    pub height: Option<f32>,
    /// Extra translation of the shape in the body frame.
    pub offset: Vec3,
    /// Extra rotation of the shape in the body frame.
    pub orientation: Quat,
    /// Collision margin.
    pub margin: f32,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            shape: ShapeKind::Box,
            fit: Fit::All,
            half_extents: None,
            radius: None,
            height: None,
            offset: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            margin: 0.01,
        }
    }
}

impl ShapeOptions {
    /// A manually sized box.
    pub fn boxed(half_extents: Vec3) -> Self {
        Self {
            shape: ShapeKind::Box,
            fit: Fit::Manual,
            half_extents: Some(half_extents),
            ..Self::default()
        }
    }

    /// A manually sized sphere.
    pub fn sphere(radius: f32) -> Self {
        Self {
            shape: ShapeKind::Sphere,
            fit: Fit::Manual,
            radius: Some(radius),
            ..Self::default()
        }
    }

    /// An auto-fitted shape of the given kind.
    pub fn fitted(shape: ShapeKind) -> Self {
        Self {
            shape,
            fit: Fit::All,
            ..Self::default()
        }
    }
}

/// Raw geometry sent along with `ADD_SHAPES`.
///
/// Each vertex array is a flat `[x, y, z, x, y, z, ...]` list expressed in the
/// frame given by the matching entry of `matrices` (world space when they are
/// world matrices). `matrix_world` is the world matrix of the mesh that owns
/// the body; vertices are brought into its local frame before fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeGeometry {
    /// Flat vertex arrays.
    pub vertices: Vec<Vec<f32>>,
    /// One matrix per vertex array.
    pub matrices: Vec<Mat4>,
    /// World matrix of the owning mesh; identity when absent.
    pub matrix_world: Option<Mat4>,
}

impl ShapeGeometry {
    /// Geometry made of one vertex array in the body's own frame.
    pub fn local(vertices: Vec<f32>) -> Self {
        Self {
            vertices: vec![vertices],
            matrices: vec![Mat4::IDENTITY],
            matrix_world: None,
        }
    }

    /// All vertices in the owning mesh's local frame.
    pub fn local_points(&self) -> Vec<Vec3> {
        let inverse = self.matrix_world.unwrap_or(Mat4::IDENTITY).inverse();
        self.vertices
            .iter()
            .enumerate()
            .flat_map(|(i, array)| {
                let to_local = inverse * self.matrices.get(i).copied().unwrap_or(Mat4::IDENTITY);
                array
                    .chunks_exact(3)
                    .map(move |c| to_local.transform_point3(Vec3::new(c[0], c[1], c[2])))
            })
            .collect()
    }
}

/// Resolved primitive geometry handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeom {
    /// A sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// A box.
    Box {
        /// Half extents along each local axis.
        half_extents: Vec3,
    },
    /// A Y-aligned round solid (cylinder, capsule, or cone).
    Round {
        /// Radius in the XZ plane.
        radius: f32,
        /// Half of the height along Y.
        half_height: f32,
    },
    /// A point cloud (hulls, meshes, height fields).
    Points(Vec<Vec3>),
}

/// A fully resolved shape, ready to attach to an engine body.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDesc {
    /// The requested family.
    pub kind: ShapeKind,
    /// Resolved dimensions.
    pub geom: ShapeGeom,
    /// Placement in the body frame.
    pub offset: Pose,
    /// Collision margin.
    pub margin: f32,
}

impl ShapeDesc {
    /// Resolve options (and optional geometry) into concrete dimensions.
    pub fn resolve(options: &ShapeOptions, geometry: Option<&ShapeGeometry>) -> CoreResult<Self> {
        let kind = options.shape;
        let placement = Pose::new(options.offset, options.orientation.normalize());

        if kind.is_point_based() {
            let points = geometry.map(ShapeGeometry::local_points).unwrap_or_default();
            if points.is_empty() {
                return Err(CoreError::EmptyGeometry(kind));
            }
            return Ok(Self {
                kind,
                geom: ShapeGeom::Points(points),
                offset: placement,
                margin: options.margin,
            });
        }

        match options.fit {
            Fit::Manual => Ok(Self {
                kind,
                geom: manual_geom(options)?,
                offset: placement,
                margin: options.margin,
            }),
            Fit::All => {
                let points = geometry.map(ShapeGeometry::local_points).unwrap_or_default();
                let (min, max) = bounds(&points).ok_or(CoreError::EmptyGeometry(kind))?;
                let center = (min + max) * 0.5;
                let half = (max - min) * 0.5;
                let geom = match kind {
                    ShapeKind::Sphere => ShapeGeom::Sphere {
                        radius: points
                            .iter()
                            .map(|p| p.distance(center))
                            .fold(0.0, f32::max),
                    },
                    ShapeKind::Cylinder | ShapeKind::Capsule | ShapeKind::Cone => {
                        ShapeGeom::Round {
                            radius: half.x.max(half.z),
                            half_height: half.y,
                        }
                    }
                    _ => ShapeGeom::Box { half_extents: half },
                };
                Ok(Self {
                    kind,
                    geom,
                    offset: Pose::new(center + options.offset, placement.rotation),
                    margin: options.margin,
                })
            }
        }
    }

    /// This shape under a body scale. Round shapes keep their cross-section
    /// circular by taking the larger of the X and Z factors.
    pub fn scaled(&self, scale: Vec3) -> Self {
        let geom = match &self.geom {
            ShapeGeom::Sphere { radius } => ShapeGeom::Sphere {
                radius: radius * scale.max_element(),
            },
            ShapeGeom::Box { half_extents } => ShapeGeom::Box {
                half_extents: *half_extents * scale,
            },
            ShapeGeom::Round {
                radius,
                half_height,
            } => ShapeGeom::Round {
                radius: radius * scale.x.max(scale.z),
                half_height: half_height * scale.y,
            },
            ShapeGeom::Points(points) => ShapeGeom::Points(points.iter().map(|p| *p * scale).collect()),
        };
        Self {
            kind: self.kind,
            geom,
            offset: Pose::new(self.offset.translation * scale, self.offset.rotation),
            margin: self.margin,
        }
    }

    /// Half extents of this shape's bounding box in its own frame.
    pub fn local_half_extents(&self) -> Vec3 {
        match &self.geom {
            ShapeGeom::Sphere { radius } => Vec3::splat(*radius),
            ShapeGeom::Box { half_extents } => *half_extents,
            ShapeGeom::Round {
                radius,
                half_height,
            } => Vec3::new(*radius, *half_height, *radius),
            ShapeGeom::Points(points) => match bounds(points) {
                Some((min, max)) => (max - min) * 0.5,
                None => Vec3::ZERO,
            },
        }
    }
}

fn manual_geom(options: &ShapeOptions) -> CoreResult<ShapeGeom> {
    let kind = options.shape;
    let missing = |field| CoreError::MissingShapeField { kind, field };
    match kind {
        ShapeKind::Sphere => Ok(ShapeGeom::Sphere {
            radius: options.radius.ok_or_else(|| missing("radius"))?,
        }),
        ShapeKind::Cylinder | ShapeKind::Capsule | ShapeKind::Cone => Ok(ShapeGeom::Round {
            radius: options.radius.ok_or_else(|| missing("radius"))?,
            half_height: options.height.ok_or_else(|| missing("height"))? * 0.5,
        }),
        _ => Ok(ShapeGeom::Box {
            half_extents: options.half_extents.ok_or_else(|| missing("half_extents"))?,
        }),
    }
}

fn bounds(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_vertices(half: f32, center: Vec3) -> Vec<f32> {
        let mut out = Vec::new();
        for x in [-half, half] {
            for y in [-half, half] {
                for z in [-half, half] {
                    out.extend_from_slice(&[center.x + x, center.y + y, center.z + z]);
                }
            }
        }
        out
    }

    #[test]
    fn manual_box_uses_half_extents() {
        let desc = ShapeDesc::resolve(&ShapeOptions::boxed(Vec3::new(1.0, 2.0, 3.0)), None).unwrap();
        assert_eq!(
            desc.geom,
            ShapeGeom::Box {
                half_extents: Vec3::new(1.0, 2.0, 3.0)
            }
        );
        assert_eq!(desc.offset, Pose::IDENTITY);
    }

    #[test]
    fn manual_round_requires_height() {
        let opts = ShapeOptions {
            shape: ShapeKind::Cylinder,
            fit: Fit::Manual,
            radius: Some(0.5),
            ..ShapeOptions::default()
        };
        assert_eq!(
            ShapeDesc::resolve(&opts, None),
            Err(CoreError::MissingShapeField {
                kind: ShapeKind::Cylinder,
                field: "height"
            })
        );
    }

    #[test]
    fn auto_fit_box_centers_on_geometry() {
        let geometry = ShapeGeometry::local(cube_vertices(0.25, Vec3::new(0.0, 1.0, 0.0)));
        let desc = ShapeDesc::resolve(&ShapeOptions::fitted(ShapeKind::Box), Some(&geometry)).unwrap();
        assert!(desc.local_half_extents().abs_diff_eq(Vec3::splat(0.25), 1e-6));
        assert!(desc.offset.translation.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn auto_fit_respects_world_matrix() {
        let world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let geometry = ShapeGeometry {
            vertices: vec![cube_vertices(0.5, Vec3::new(10.0, 0.0, 0.0))],
            matrices: vec![Mat4::IDENTITY],
            matrix_world: Some(world),
        };
        let desc = ShapeDesc::resolve(&ShapeOptions::fitted(ShapeKind::Sphere), Some(&geometry)).unwrap();
        assert!(desc.offset.translation.abs_diff_eq(Vec3::ZERO, 1e-5));
        match desc.geom {
            ShapeGeom::Sphere { radius } => assert!((radius - 0.75_f32.sqrt()).abs() < 1e-5),
            other => panic!("expected sphere, got {other:?}"),
        }
    }

    #[test]
    fn scaling_stretches_dimensions_and_offset() {
        let mut opts = ShapeOptions::boxed(Vec3::ONE);
        opts.offset = Vec3::new(0.0, 1.0, 0.0);
        let desc = ShapeDesc::resolve(&opts, None).unwrap().scaled(Vec3::new(2.0, 3.0, 1.0));
        assert_eq!(desc.local_half_extents(), Vec3::new(2.0, 3.0, 1.0));
        assert_eq!(desc.offset.translation, Vec3::new(0.0, 3.0, 0.0));

        let sphere = ShapeDesc::resolve(&ShapeOptions::sphere(0.5), None).unwrap();
        assert_eq!(
            sphere.scaled(Vec3::new(1.0, 4.0, 2.0)).geom,
            ShapeGeom::Sphere { radius: 2.0 }
        );
    }

    #[test]
    fn hull_without_points_is_rejected() {
        assert_eq!(
            ShapeDesc::resolve(&ShapeOptions::fitted(ShapeKind::Hull), None),
            Err(CoreError::EmptyGeometry(ShapeKind::Hull))
        );
    }
}
