use std::time::{Duration, Instant};

/// Tracks engine steps: how many ran and how much wall time separated them.
///
/// The engine advances by measured time, not by the nominal timer period,
/// so a late tick simply produces a longer step.
#[derive(Debug, Clone)]
pub struct StepClock {
    steps: u64,
    nominal: Duration,
    last_step: Option<Instant>,
    elapsed: Duration,
}

impl StepClock {
    /// A clock whose first step lasts `nominal`.
    pub fn new(nominal: Duration) -> Self {
        Self {
            steps: 0,
            nominal,
            last_step: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Record a step starting at `now` and return its length.
    pub fn advance(&mut self, now: Instant) -> Duration {
        let dt = match self.last_step {
            Some(last) => now.saturating_duration_since(last),
            None => self.nominal,
        };
        self.last_step = Some(now);
        self.steps += 1;
        self.elapsed += dt;
        dt
    }

    /// Number of steps taken.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated time so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Length of the first step.
    pub fn nominal(&self) -> Duration {
        self.nominal
    }

    /// Change the nominal period; the next step is measured from the last one as usual.
    pub fn set_nominal(&mut self, nominal: Duration) {
        self.nominal = nominal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_uses_nominal_period() {
        let mut clock = StepClock::new(Duration::from_millis(16));
        let dt = clock.advance(Instant::now());
        assert_eq!(dt, Duration::from_millis(16));
        assert_eq!(clock.steps(), 1);
    }

    #[test]
    fn later_steps_are_measured() {
        let mut clock = StepClock::new(Duration::from_millis(16));
        let start = Instant::now();
        clock.advance(start);
        let dt = clock.advance(start + Duration::from_millis(40));
        assert_eq!(dt, Duration::from_millis(40));
        assert_eq!(clock.steps(), 2);
        assert_eq!(clock.elapsed(), Duration::from_millis(56));
    }

    #[test]
    fn clock_going_backwards_yields_zero() {
        let mut clock = StepClock::new(Duration::from_millis(16));
        let start = Instant::now() + Duration::from_millis(100);
        clock.advance(start);
        let dt = clock.advance(start - Duration::from_millis(10));
        assert_eq!(dt, Duration::ZERO);
    }
}
