//! The classical iterative endstop + delta-radius calibrator: a coarse
//! pre-pass using only four probes per iteration (spec.md §4.5).

use crate::constants::{
    ITERATIVE_DELTA_RADIUS_GAIN, ITERATIVE_MAX_ITERATIONS, ITERATIVE_TOLERANCE_MM,
    ITERATIVE_TRIMSCALE_DECAY, ITERATIVE_TRIMSCALE_FLOOR, ITERATIVE_TRIMSCALE_INITIAL,
};
use crate::error::Result;
use crate::geometry::{Grid, Tower};
use crate::kinematics::{ArmSolution, KinematicState};
use crate::probe::{ProbeAdapter, ProbeDriver};

/// Result of an [`iterative_calibrate`] run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeOutcome {
    pub iterations: usize,
    pub endstop_in_tolerance: bool,
    pub delta_radius_in_tolerance: bool,
    /// The trim-scale multiplier as of the last iteration -- useful for
    /// diagnosing a calibration that hit the iteration cap without converging.
    pub final_trimscale: f64,
}

impl IterativeOutcome {
    pub fn converged(&self) -> bool {
        self.endstop_in_tolerance && self.delta_radius_in_tolerance
    }
}

/// Coarse endstop/delta-radius convergence using four probes per iteration
/// (center + near each tower), for at most [`ITERATIVE_MAX_ITERATIONS`].
pub fn iterative_calibrate<D: ProbeDriver, A: ArmSolution>(
    adapter: &mut ProbeAdapter<D>,
    state: &mut KinematicState<A>,
    grid: &Grid,
) -> Result<IterativeOutcome> {
    let center_xy = grid.point(grid.center_index()).coord;
    let tower_xy = [
        grid.point(grid.tower_point(Tower::X)).coord,
        grid.point(grid.tower_point(Tower::Y)).coord,
        grid.point(grid.tower_point(Tower::Z)).coord,
    ];

    let mut trimscale = ITERATIVE_TRIMSCALE_INITIAL;
    let mut prev_endstop_dev: Option<f64> = None;
    let mut endstop_in_tolerance = false;
    let mut delta_radius_in_tolerance = false;
    let mut iterations = 0;

    for _ in 0..ITERATIVE_MAX_ITERATIONS {
        iterations += 1;

        let depth_center = adapter.driver().steps_to_mm(adapter.probe_at(center_xy.x, center_xy.y)?);
        let mut tower_depths = [0.0; 3];
        for (t, p) in tower_xy.iter().enumerate() {
            let steps = adapter.probe_at(p.x, p.y)?;
            tower_depths[t] = adapter.driver().steps_to_mm(steps);
        }

        let four_depths = [depth_center, tower_depths[0], tower_depths[1], tower_depths[2]];
        let max = four_depths.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = four_depths.iter().cloned().fold(f64::INFINITY, f64::min);
        let endstop_dev = max - min;

        if endstop_dev <= ITERATIVE_TOLERANCE_MM {
            endstop_in_tolerance = true;
        } else {
            endstop_in_tolerance = false;
            let mut trim = state.settings().trim;
            for t in 0..3 {
                trim[t] += (min - tower_depths[t]) * trimscale;
            }
            state.set_trim(trim)?;

            if let Some(prev) = prev_endstop_dev {
                if endstop_dev >= prev && trimscale * ITERATIVE_TRIMSCALE_DECAY >= ITERATIVE_TRIMSCALE_FLOOR {
                    trimscale *= ITERATIVE_TRIMSCALE_DECAY;
                }
            }
        }
        prev_endstop_dev = Some(endstop_dev);

        let mean_tower = tower_depths.iter().sum::<f64>() / 3.0;
        let delta_radius_dev = depth_center - mean_tower;
        if delta_radius_dev.abs() <= ITERATIVE_TOLERANCE_MM {
            delta_radius_in_tolerance = true;
        } else {
            delta_radius_in_tolerance = false;
            let new_radius = state.settings().delta_radius + delta_radius_dev * ITERATIVE_DELTA_RADIUS_GAIN;
            state.set_delta_radius(new_radius)?;
        }

        if endstop_in_tolerance && delta_radius_in_tolerance {
            break;
        }
    }

    Ok(IterativeOutcome { iterations, endstop_in_tolerance, delta_radius_in_tolerance, final_trimscale: trimscale })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point3D, Shape};
    use crate::kinematics::{KinematicSettings, MotionController};

    #[derive(Default)]
    struct FakeArm {
        applied: Option<KinematicSettings>,
    }

    impl ArmSolution for FakeArm {
        fn apply(&mut self, settings: &KinematicSettings) {
            self.applied = Some(*settings);
        }
        fn cartesian_to_actuator(&self, position: Point3D) -> [f64; 3] {
            [position.z; 3]
        }
        fn actuator_to_cartesian(&self, actuator: [f64; 3]) -> Point3D {
            Point3D::new(0.0, 0.0, actuator[0])
        }
    }

    #[allow(dead_code)]
    struct FakeMotion;
    impl MotionController for FakeMotion {
        fn reseat(&mut self, _position: Point3D) {}
        fn set_z_max(&mut self, _z_max: f64) {}
    }

    /// Returns steps that depend only on which tower-near point was probed,
    /// simulating a machine with a fixed endstop skew that set_trim should
    /// converge away.
    struct SkewedDriver {
        accel: f64,
    }

    impl ProbeDriver for SkewedDriver {
        fn move_to_xy(&mut self, _x: f64, _y: f64) {}
        fn run_probe(&mut self) -> std::result::Result<i64, ()> {
            Ok(400)
        }
        fn return_probe(&mut self, _measured_steps: i64) {}
        fn global_acceleration(&self) -> f64 {
            self.accel
        }
        fn set_acceleration(&mut self, acceleration: f64) {
            self.accel = acceleration;
        }
        fn steps_to_mm(&self, steps: i64) -> f64 {
            steps as f64 / 400.0
        }
    }

    #[test]
    fn flat_bed_converges_immediately() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let config = crate::probe::ProbeConfig::new(1, 0, 1000.0, Point3D::default(), 5.0, 1.0, 20, false).unwrap();
        let mut adapter = ProbeAdapter::new(SkewedDriver { accel: 1000.0 }, config);
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::new(200.0, 120.0));

        let outcome = iterative_calibrate(&mut adapter, &mut state, &grid).unwrap();
        assert!(outcome.converged());
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn never_exceeds_the_iteration_cap() {
        struct NoisyDriver {
            call: std::cell::Cell<i64>,
            accel: f64,
        }
        impl ProbeDriver for NoisyDriver {
            fn move_to_xy(&mut self, _x: f64, _y: f64) {}
            fn run_probe(&mut self) -> std::result::Result<i64, ()> {
                let n = self.call.get();
                self.call.set(n + 1);
                Ok(400 + (n % 7) * 3)
            }
            fn return_probe(&mut self, _measured_steps: i64) {}
            fn global_acceleration(&self) -> f64 {
                self.accel
            }
            fn set_acceleration(&mut self, acceleration: f64) {
                self.accel = acceleration;
            }
            fn steps_to_mm(&self, steps: i64) -> f64 {
                steps as f64 / 400.0
            }
        }

        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let config = crate::probe::ProbeConfig::new(1, 0, 1000.0, Point3D::default(), 5.0, 1.0, 20, false).unwrap();
        let mut adapter = ProbeAdapter::new(NoisyDriver { call: std::cell::Cell::new(0), accel: 1000.0 }, config);
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::new(200.0, 120.0));

        let outcome = iterative_calibrate(&mut adapter, &mut state, &grid).unwrap();
        assert!(outcome.iterations <= ITERATIVE_MAX_ITERATIONS);
    }
}
