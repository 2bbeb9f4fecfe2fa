use std::time::Duration;

use relay_core::constants::{MAX_BODIES, SIMULATION_RATE};
use relay_engine::WorldConfig;
use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, WorkerResult};

/// Everything the worker needs at INIT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of live bodies, and the number of buffer records.
    pub capacity: usize,
    /// Period of the fixed-rate timer, in seconds.
    pub simulation_rate: f64,
    /// Ticks a body that starts out dynamic waits before physics drives it.
    pub initial_sync_ticks: u32,
    /// Physics world settings.
    pub world: WorldConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_BODIES,
            simulation_rate: SIMULATION_RATE,
            initial_sync_ticks: 1,
            world: WorldConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> WorkerResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| WorkerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the body capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the timer period in seconds.
    pub fn with_simulation_rate(mut self, seconds: f64) -> Self {
        self.simulation_rate = seconds;
        self
    }

    /// Set how many ticks new dynamic bodies wait for their first pose.
    pub fn with_initial_sync_ticks(mut self, ticks: u32) -> Self {
        self.initial_sync_ticks = ticks;
        self
    }

    /// Set the world config.
    pub fn with_world(mut self, world: WorldConfig) -> Self {
        self.world = world;
        self
    }

    /// Timer period as a [`Duration`]. Fails unless the rate is a positive
    /// period that fits in a `Duration`.
    pub fn tick_interval(&self) -> WorkerResult<Duration> {
        tick_period(self.simulation_rate)
    }

    /// Reject configs the worker cannot start with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.capacity == 0 {
            return Err(WorkerError::Config("capacity must be at least 1".into()));
        }
        self.tick_interval()?;
        self.world.validate()?;
        Ok(())
    }
}

/// Convert a timer period in seconds, rejecting zero, negative, non-finite
/// and out-of-range values.
pub(crate) fn tick_period(seconds: f64) -> WorkerResult<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(WorkerError::Config(format!(
            "simulation_rate must be a positive number of seconds, got {seconds}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.initial_sync_ticks, 1);
        assert!((config.simulation_rate - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder_chain() {
        let config = WorkerConfig::default()
            .with_capacity(16)
            .with_simulation_rate(0.5)
            .with_initial_sync_ticks(3);
        assert_eq!(config.capacity, 16);
        assert_eq!(config.tick_interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.initial_sync_ticks, 3);
    }

    #[test]
    fn config_from_json() {
        let config =
            WorkerConfig::from_json(r#"{"capacity": 32, "world": {"solver_iterations": 4}}"#)
                .unwrap();
        assert_eq!(config.capacity, 32);
        assert_eq!(config.world.solver_iterations, 4);
        assert_eq!(config.world.max_sub_steps, 4);
    }

    #[test]
    fn config_from_json_rejects_bad_values() {
        assert!(matches!(
            WorkerConfig::from_json(r#"{"capacity": 0}"#),
            Err(WorkerError::Config(_))
        ));
        assert!(matches!(
            WorkerConfig::from_json(r#"{"world": {"fixed_time_step": -1.0}}"#),
            Err(WorkerError::Engine(_))
        ));
        assert!(matches!(
            WorkerConfig::from_json("not json"),
            Err(WorkerError::Config(_))
        ));
    }

    #[test]
    fn config_rejects_rates_outside_duration_range() {
        assert!(matches!(
            WorkerConfig::from_json(r#"{"capacity": 2, "simulation_rate": 1e20}"#),
            Err(WorkerError::Config(_))
        ));
        for rate in [0.0, -0.5, f64::NAN, f64::INFINITY, 1e-12] {
            let config = WorkerConfig::default().with_simulation_rate(rate);
            assert!(config.validate().is_err(), "rate {rate} accepted");
        }
        assert_eq!(tick_period(0.25).unwrap(), Duration::from_millis(250));
    }
}
