use tracing::warn;
use crate::error::SolverError;

/// Simulation clock. `time_prev` trails `time` by the last step size.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTracker {
    pub time: f64,
    pub time_prev: f64,
    pub dt: f64,
    pub dt_max: f64,
    pub end_time: f64,
    pub cfl_max: f64,
    pub step: usize,
    pub sub_iterations: usize,
}

impl TimeTracker {
    pub fn new(dt_max: f64, end_time: f64, cfl_max: f64) -> Result<Self, SolverError> {
        if !(dt_max > 0.0) || !dt_max.is_finite() {
            return Err(SolverError::InvalidParameter(format!("maximum time step must be positive, got {}", dt_max)));
        }
        if !(end_time >= 0.0) {
            return Err(SolverError::InvalidParameter(format!("end time must be non-negative, got {}", end_time)));
        }
        if !(cfl_max > 0.0) {
            return Err(SolverError::InvalidParameter(format!("maximum CFL must be positive, got {}", cfl_max)));
        }
        Ok(Self {
            time: 0.0,
            time_prev: 0.0,
            dt: dt_max,
            dt_max,
            end_time,
            cfl_max,
            step: 0,
            sub_iterations: 1,
        })
    }

    /// Sets the step size, clamped to `dt_max`. Returns the value in effect.
    pub fn set_dt(&mut self, dt: f64) -> Result<f64, SolverError> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SolverError::InvalidParameter(format!("time step must be positive, got {}", dt)));
        }
        if dt > self.dt_max {
            warn!(dt, dt_max = self.dt_max, "Time step clamped to maximum");
        }
        self.dt = dt.min(self.dt_max);
        Ok(self.dt)
    }

    /// Restores the clock from persisted values: the previous time is
    /// reconstructed as `time - dt`. The persisted `dt` is kept as is, even
    /// above `dt_max`; the next `set_dt` brings it back under the limit.
    pub fn restore(&mut self, time: f64, dt: f64) -> Result<(), SolverError> {
        if !time.is_finite() {
            return Err(SolverError::InvalidParameter(format!("restored time is not finite: {}", time)));
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SolverError::InvalidParameter(format!("restored time step must be positive, got {}", dt)));
        }
        if dt > self.dt_max {
            warn!(dt, dt_max = self.dt_max, "Restored time step exceeds the configured maximum");
        }
        self.dt = dt;
        self.time = time;
        self.time_prev = time - dt;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_tracker() {
        let t = TimeTracker::new(0.01, 10.0, 0.8).unwrap();
        assert_eq!(t.time, 0.0);
        assert_eq!(t.time_prev, 0.0);
        assert_eq!(t.dt, 0.01);
        assert_eq!(t.step, 0);
        assert!(!t.is_finished());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(TimeTracker::new(0.0, 10.0, 0.8).is_err());
        assert!(TimeTracker::new(0.01, -1.0, 0.8).is_err());
        assert!(TimeTracker::new(0.01, 10.0, 0.0).is_err());
    }

    #[test]
    fn test_dt_clamped_to_maximum() {
        let mut t = TimeTracker::new(0.01, 10.0, 0.8).unwrap();
        assert_eq!(t.set_dt(0.5).unwrap(), 0.01);
        assert_eq!(t.set_dt(0.005).unwrap(), 0.005);
        assert!(t.set_dt(-1.0).is_err());
        assert!(t.set_dt(f64::NAN).is_err());
    }

    #[test]
    fn test_restore_sets_previous_time() {
        let mut t = TimeTracker::new(0.01, 10.0, 0.8).unwrap();
        t.restore(5.0, 0.01).unwrap();
        assert_eq!(t.time, 5.0);
        assert_relative_eq!(t.time_prev, 4.99, epsilon = 1e-12);
        assert!(t.time >= t.time_prev);
        assert!(t.restore(f64::INFINITY, 0.01).is_err());
        assert!(t.restore(1.0, 0.0).is_err());
    }

    #[test]
    fn test_restore_keeps_step_above_maximum() {
        let mut t = TimeTracker::new(0.01, 10.0, 0.8).unwrap();
        t.restore(5.0, 0.02).unwrap();
        assert_eq!(t.dt, 0.02);
        assert_eq!(t.time - t.time_prev, 5.0 - (5.0 - 0.02));
        assert_eq!(t.set_dt(t.dt).unwrap(), 0.01);
    }
}
