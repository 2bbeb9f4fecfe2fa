//! Core types for Physrelay: identifiers, option types, and protocol constants.
//!
//! Everything in this crate is plain data shared by the host and the physics
//! worker. Nothing here touches threads, buffers, or an engine, so option
//! types can be built and validated on either side of the control channel.

/// Body options, partial updates, and body kinds.
pub mod body;
/// Protocol-wide constants.
pub mod constants;
/// Constraint kinds and options.
pub mod constraint;
/// Error types for option validation.
pub mod error;
/// Opaque identifiers supplied by the host.
pub mod id;
/// Transform helpers on top of `glam`.
pub mod math;
/// Shape kinds, options, and geometry resolution.
pub mod shape;

/// Re-export body option types.
pub use body::{ActivationState, BodyChanges, BodyOptions, BodyType, BodyUpdate};
/// Re-export constraint option types.
pub use constraint::{ConstraintKind, ConstraintOptions};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export identifier types.
pub use id::{BodyId, ConstraintId, ShapesId};
/// Re-export math helpers.
pub use math::{DebugLine, Pose};
/// Re-export shape types.
pub use shape::{Fit, ShapeDesc, ShapeGeom, ShapeGeometry, ShapeKind, ShapeOptions};
