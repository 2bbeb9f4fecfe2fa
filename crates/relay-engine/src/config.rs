use glam::Vec3;
use relay_core::constants::{
    COLLISION_EPSILON, FIXED_TIME_STEP, GRAVITY, MAX_SUB_STEPS, SOLVER_ITERATIONS,
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// World-wide physics settings, fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Gravity for bodies without an override.
    pub gravity: Vec3,
    /// Contacts at or under this distance count as collisions.
    pub epsilon: f32,
    /// Most sub-steps taken per `step` call; leftover time is dropped.
    pub max_sub_steps: u32,
    /// Length of one engine sub-step, in seconds.
    pub fixed_time_step: f32,
    /// Constraint iterations per sub-step.
    pub solver_iterations: u32,
    /// Whether debug drawing starts enabled.
    pub debug_draw: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
            epsilon: COLLISION_EPSILON,
            max_sub_steps: MAX_SUB_STEPS,
            fixed_time_step: FIXED_TIME_STEP,
            solver_iterations: SOLVER_ITERATIONS,
            debug_draw: false,
        }
    }
}

impl WorldConfig {
    /// Set world gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the collision distance threshold.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the maximum number of sub-steps per step.
    pub fn with_max_sub_steps(mut self, steps: u32) -> Self {
        self.max_sub_steps = steps;
        self
    }

    /// Set the sub-step length in seconds.
    pub fn with_fixed_time_step(mut self, seconds: f32) -> Self {
        self.fixed_time_step = seconds;
        self
    }

    /// Set the solver iteration count.
    pub fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Enable or disable debug drawing at start.
    pub fn with_debug_draw(mut self, enabled: bool) -> Self {
        self.debug_draw = enabled;
        self
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> EngineResult<()> {
        if !positive(self.fixed_time_step) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_time_step must be positive, got {}",
                self.fixed_time_step
            )));
        }
        if self.max_sub_steps == 0 {
            return Err(EngineError::InvalidConfig(
                "max_sub_steps must be at least 1".into(),
            ));
        }
        if self.solver_iterations == 0 {
            return Err(EngineError::InvalidConfig(
                "solver_iterations must be at least 1".into(),
            ));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 || self.epsilon.is_infinite() {
            return Err(EngineError::InvalidConfig(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        if !self.gravity.is_finite() {
            return Err(EngineError::InvalidConfig("gravity must be finite".into()));
        }
        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
