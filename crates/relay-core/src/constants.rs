//! Values shared by both sides of the control channel.

/// Default world gravity along Y, in m/s².
pub const GRAVITY: f32 = -9.8;

/// Default maximum number of live bodies (and buffer records).
pub const MAX_BODIES: usize = 10_000;

/// Default fixed-rate timer period, in seconds.
pub const SIMULATION_RATE: f64 = 1.0 / 60.0;

/// Default number of solver iterations per sub-step.
pub const SOLVER_ITERATIONS: u32 = 10;

/// Default maximum number of engine sub-steps per tick.
pub const MAX_SUB_STEPS: u32 = 4;

/// Default engine sub-step length, in seconds.
pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// Default distance under which a contact point counts as a collision.
pub const COLLISION_EPSILON: f32 = 10e-6;

/// Tolerance used when comparing poses and vectors for change.
pub const POSE_EPSILON: f32 = 0.001;
