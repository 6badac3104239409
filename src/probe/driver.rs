//! The probe-driver adapter (spec.md §4.2).
//!
//! Wraps the external [`ProbeDriver`] collaborator with smoothing
//! (averaging `smoothing` taps), priming (discarding the first `priming`
//! taps), acceleration save/restore around each probe, and XY/Z offset
//! compensation.

use crate::constants::PROBE_MIN_STEPS;
use crate::error::{CalibrationError, Result};
use crate::kinematics::MotionController;
use crate::probe::config::ProbeConfig;

/// The external Z-probe driver collaborator: run-probe, return-probe,
/// acceleration control, and the step<->mm conversion (spec.md §1).
pub trait ProbeDriver {
    /// Move to (x, y) at the probe's configured feedrate. Blocks on the
    /// motion queue draining (spec.md §5).
    fn move_to_xy(&mut self, x: f64, y: f64);

    /// Trigger a single probe. Returns the measured distance in steps, or
    /// `Err(())` if the probe never triggered.
    fn run_probe(&mut self) -> std::result::Result<i64, ()>;

    /// Retract after a probe. `measured_steps` is the full distance
    /// travelled by the just-completed [`ProbeDriver::run_probe`] when the
    /// adapter is not decelerating on trigger; implementations that
    /// decelerate-on-trigger may ignore it and return to the origin at the
    /// deceleration point instead.
    fn return_probe(&mut self, measured_steps: i64);

    fn global_acceleration(&self) -> f64;
    fn set_acceleration(&mut self, acceleration: f64);

    fn steps_to_mm(&self, steps: i64) -> f64;
}

/// Wraps a [`ProbeDriver`] with the smoothing/priming/offset/acceleration
/// behavior spec.md §4.2 requires of every probe call site.
pub struct ProbeAdapter<D: ProbeDriver> {
    driver: D,
    config: ProbeConfig,
}

impl<D: ProbeDriver> ProbeAdapter<D> {
    pub fn new(driver: D, config: ProbeConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Probe at (x, y), averaging `config.smoothing` taps. Fails with
    /// [`CalibrationError::ProbeFailed`] if the underlying probe fails to
    /// trigger, or if the averaged result is below 100 steps.
    pub fn probe_at(&mut self, x: f64, y: f64) -> Result<i64> {
        let saved_accel = self.driver.global_acceleration();
        self.driver.set_acceleration(self.config.acceleration);
        self.driver
            .move_to_xy(x + self.config.offset.x, y + self.config.offset.y);

        let mut total: i64 = 0;
        for _ in 0..self.config.smoothing {
            let steps = self.driver.run_probe().map_err(|_| CalibrationError::ProbeFailed {
                x,
                y,
                reason: "probe did not trigger",
            })?;
            total += steps;
            if self.config.decelerate_on_trigger {
                self.driver.return_probe(0);
            } else {
                self.driver.return_probe(steps);
            }
        }
        self.driver.set_acceleration(saved_accel);

        let average = total / self.config.smoothing as i64;
        if average < PROBE_MIN_STEPS {
            return Err(CalibrationError::ProbeFailed {
                x,
                y,
                reason: "averaged probe result below minimum step count",
            });
        }
        Ok(average)
    }

    /// Run `config.priming` probes at the probe's XY offset and discard
    /// the results (Z-settling).
    pub fn prime(&mut self) {
        if self.config.priming == 0 {
            return;
        }
        self.driver
            .move_to_xy(self.config.offset.x, self.config.offset.y);
        for _ in 0..self.config.priming {
            let _ = self.driver.run_probe();
            self.driver.return_probe(0);
        }
    }

    /// Fast-probe to locate the bed, prime, then slow-probe at the probe
    /// offset to derive the absolute bed height, which is pushed to the
    /// motion controller as the new Z max.
    pub fn find_bed_center_height<M: MotionController>(
        &mut self,
        motion: &mut M,
        probe_clearance_mm: f64,
        height_to_trigger_mm: f64,
    ) -> Result<f64> {
        self.driver.move_to_xy(0.0, 0.0);
        let fast_steps = self
            .driver
            .run_probe()
            .map_err(|_| CalibrationError::ProbeFailed { x: 0.0, y: 0.0, reason: "fast probe did not trigger" })?;
        self.driver.return_probe(fast_steps);
        let measured_height = self.driver.steps_to_mm(fast_steps);
        let probe_from_height = measured_height - probe_clearance_mm;

        self.prime();
        self.driver
            .move_to_xy(self.config.offset.x, self.config.offset.y);
        let slow_steps = self
            .driver
            .run_probe()
            .map_err(|_| CalibrationError::ProbeFailed { x: 0.0, y: 0.0, reason: "slow probe did not trigger" })?;
        self.driver.return_probe(slow_steps);

        let bed_height = probe_from_height + height_to_trigger_mm + self.config.offset.z;
        motion.set_z_max(bed_height);
        Ok(bed_height)
    }
}
