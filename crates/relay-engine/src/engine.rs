use glam::Vec3;
use relay_core::{
    ActivationState, BodyOptions, BodyType, ConstraintOptions, DebugLine, Pose, ShapeDesc,
};

use crate::error::EngineResult;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Wrap a raw value. Engines outside this crate mint handles this way.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw handle value, for logging.
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle! {
    /// Engine-side body handle.
    BodyHandle
}

handle! {
    /// Engine-side handle of one attached shape.
    ShapeHandle
}

handle! {
    /// Engine-side constraint handle.
    ConstraintHandle
}

/// Everything an engine needs to create a body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    /// Initial pose.
    pub pose: Pose,
    /// Body options, already validated.
    pub options: BodyOptions,
}

/// Linear and angular velocity of a body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    /// Linear velocity, m/s.
    pub linear: Vec3,
    /// Angular velocity, rad/s.
    pub angular: Vec3,
}

impl Velocity {
    /// No motion.
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
    };
}

/// One contact point between two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Signed distance; negative when penetrating.
    pub distance: f32,
    /// World-space contact position.
    pub position: Vec3,
    /// Contact normal pointing from the owner to the other body.
    pub normal: Vec3,
}

/// Contacts between one ordered pair of bodies after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    /// The owner of the manifold.
    pub body0: BodyHandle,
    /// The other body.
    pub body1: BodyHandle,
    /// Contact points, in engine order.
    pub points: Vec<ContactPoint>,
}

impl ContactManifold {
    /// The first point at or under `epsilon`, if any.
    pub fn touching(&self, epsilon: f32) -> Option<&ContactPoint> {
        self.points.iter().find(|p| p.distance <= epsilon)
    }
}

/// What the worker needs from a physics engine.
///
/// Setters on unknown handles are no-ops; only creation reports errors.
pub trait PhysicsEngine {
    /// Create a body.
    fn add_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle>;

    /// Destroy a body with its shapes and any constraints using it.
    fn remove_body(&mut self, body: BodyHandle);

    /// Attach a resolved shape to a body.
    fn add_shape(&mut self, body: BodyHandle, shape: &ShapeDesc) -> EngineResult<ShapeHandle>;

    /// Detach a shape.
    fn remove_shape(&mut self, body: BodyHandle, shape: ShapeHandle);

    /// Join two bodies.
    fn add_constraint(
        &mut self,
        body: BodyHandle,
        target: BodyHandle,
        options: &ConstraintOptions,
    ) -> EngineResult<ConstraintHandle>;

    /// Remove a constraint.
    fn remove_constraint(&mut self, constraint: ConstraintHandle);

    /// Advance the world by `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Contact manifolds from the last step.
    fn manifolds(&self) -> &[ContactManifold];

    /// Current pose of a body.
    fn pose(&self, body: BodyHandle) -> Option<Pose>;

    /// Teleport a body.
    fn set_pose(&mut self, body: BodyHandle, pose: Pose);

    /// Current velocity of a body.
    fn velocity(&self, body: BodyHandle) -> Option<Velocity>;

    /// Overwrite a body's velocity.
    fn set_velocity(&mut self, body: BodyHandle, velocity: Velocity);

    /// Wake a body up.
    fn activate(&mut self, body: BodyHandle);

    /// Whether a body is currently awake.
    fn is_active(&self, body: BodyHandle) -> bool;

    /// Force an activation state.
    fn set_activation_state(&mut self, body: BodyHandle, state: ActivationState);

    /// Change body type and whether contacts produce a response.
    fn set_body_type(&mut self, body: BodyHandle, body_type: BodyType, disable_collision: bool);

    /// Change mass.
    fn set_mass(&mut self, body: BodyHandle, mass: f32);

    /// Change damping.
    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32);

    /// Change the body's gravity.
    fn set_gravity(&mut self, body: BodyHandle, gravity: Vec3);

    /// Change sleeping thresholds.
    fn set_sleeping_thresholds(&mut self, body: BodyHandle, linear: f32, angular: f32);

    /// Change per-axis angular factor.
    fn set_angular_factor(&mut self, body: BodyHandle, factor: Vec3);

    /// Change collision filter group and mask.
    fn set_collision_filter(&mut self, body: BodyHandle, group: u32, mask: u32);

    /// World gravity.
    fn world_gravity(&self) -> Vec3;

    /// Append debug lines for the current state.
    fn debug_lines(&self, _out: &mut Vec<DebugLine>) {}

    /// Release everything. The engine is unusable afterwards.
    fn teardown(&mut self);
}
