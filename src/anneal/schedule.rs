//! The simulated annealer: parallel coordinate descent over the active
//! [`OptimizationTarget`]s, with a cooling schedule and stall detection
//! (spec.md §4.7).

use rand::Rng;

use crate::anneal::binary_search::binary_search_optimum;
use crate::anneal::targets::{active_targets, OptimizationTarget};
use crate::constants::{
    ANNEAL_GLOBAL_TARGET_MM, ANNEAL_INITIAL_HALF_WIDTH_MM, ANNEAL_MAX_BINSEARCH_ROUNDS,
    ANNEAL_MAX_TEMP_MAX, ANNEAL_OVERRUN_DIVISOR_MAX, ANNEAL_OVERRUN_DIVISOR_MIN, ANNEAL_SAMPLE_STRIDE,
    ANNEAL_STALL_SIGMA, ANNEAL_STALL_WINDOW, ANNEAL_TEMP_FLOOR, ANNEAL_TRIES_MAX, ANNEAL_TRIES_MIN,
    ANNEAL_VARIABLE_TARGET_MM,
};
use crate::energy::{simulate_fk_energy, AxisPositions};
use crate::error::{CalibrationError, Result};
use crate::geometry::Grid;
use crate::kinematics::{ArmSolution, CaltypeFlags, KinematicState, MotionController};
use crate::surface::TiltPlane;

/// Validated annealer parameters (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealConfig {
    pub tries: usize,
    pub max_temp: f64,
    pub binsearch_width: f64,
    pub overrun_divisor: f64,
}

impl AnnealConfig {
    pub fn new(tries: usize, max_temp: f64, binsearch_width: f64, overrun_divisor: f64) -> Result<Self> {
        if !(ANNEAL_TRIES_MIN..=ANNEAL_TRIES_MAX).contains(&tries) {
            return Err(CalibrationError::ConfigInvalid(format!(
                "annealing_tries={tries} out of range [{ANNEAL_TRIES_MIN}, {ANNEAL_TRIES_MAX}]"
            )));
        }
        if !(0.0..=ANNEAL_MAX_TEMP_MAX).contains(&max_temp) {
            return Err(CalibrationError::ConfigInvalid(format!(
                "max_temp={max_temp} out of range [0, {ANNEAL_MAX_TEMP_MAX}]"
            )));
        }
        if !(0.0..=crate::constants::ANNEAL_BINSEARCH_WIDTH_MAX).contains(&binsearch_width) {
            return Err(CalibrationError::ConfigInvalid(format!(
                "binsearch_width={binsearch_width} out of range [0, {}]",
                crate::constants::ANNEAL_BINSEARCH_WIDTH_MAX
            )));
        }
        if !(ANNEAL_OVERRUN_DIVISOR_MIN..=ANNEAL_OVERRUN_DIVISOR_MAX).contains(&overrun_divisor) {
            return Err(CalibrationError::ConfigInvalid(format!(
                "overrun_divisor={overrun_divisor} out of range [{ANNEAL_OVERRUN_DIVISOR_MIN}, {ANNEAL_OVERRUN_DIVISOR_MAX}]"
            )));
        }
        Ok(Self { tries, max_temp, binsearch_width, overrun_divisor })
    }
}

/// Why an [`Annealer::run`] call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ReachedGlobalTarget,
    Stalled,
    ExhaustedTries,
    Aborted,
}

/// Outcome of a completed annealing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealOutcome {
    pub tries_run: usize,
    pub final_energy: f64,
    pub stop_reason: StopReason,
}

impl AnnealOutcome {
    pub fn converged(&self) -> bool {
        self.final_energy <= ANNEAL_GLOBAL_TARGET_MM
    }
}

/// Lets the host runtime service serial/idle work during long operations
/// (spec.md §5's cooperative "flush"). Returns `true` to request abort.
pub trait CooperativeYield {
    fn flush(&mut self) -> bool;
}

/// Never yields, never aborts -- useful for tests and batch/offline runs.
pub struct NoopYield;

impl CooperativeYield for NoopYield {
    fn flush(&mut self) -> bool {
        false
    }
}

/// Parallel coordinate-descent simulated annealer over the active caltype
/// variables, operating on a frozen [`AxisPositions`] buffer.
pub struct Annealer {
    config: AnnealConfig,
    ranges: Vec<(OptimizationTarget, f64, f64)>,
}

impl Annealer {
    /// Build an annealer over every scalar variable whose caltype is active
    /// in `flags`, seeded from `initial` with a symmetric starting range.
    pub fn new(config: AnnealConfig, flags: &CaltypeFlags, initial: &crate::kinematics::KinematicSettings) -> Self {
        let ranges = active_targets(flags)
            .into_iter()
            .map(|target| {
                let v = target.get(initial);
                (target, v - ANNEAL_INITIAL_HALF_WIDTH_MM, v + ANNEAL_INITIAL_HALF_WIDTH_MM)
            })
            .collect();
        Self { config, ranges }
    }

    pub fn active_target_count(&self) -> usize {
        self.ranges.len()
    }

    /// Run the annealing schedule. `axis_positions` is the frozen IK capture
    /// from the most recent real probing pass; `tri_xy` is the virtual-
    /// shimming plane's fixed anchor locations, used to rebuild the tilt
    /// plane from each candidate's `virtual_shimming` triplet so that
    /// caltype actually moves the FK energy the binary search sees.
    pub fn run<A: ArmSolution, M: MotionController, R: Rng, Y: CooperativeYield>(
        &mut self,
        state: &mut KinematicState<A>,
        motion: &mut M,
        grid: &Grid,
        axis_positions: &AxisPositions,
        tri_xy: [(f64, f64); 3],
        flags: &CaltypeFlags,
        rng: &mut R,
        yielder: &mut Y,
    ) -> Result<AnnealOutcome> {
        let mut window: Vec<f64> = Vec::with_capacity(ANNEAL_STALL_WINDOW);
        let mut last_energy = current_energy(state, grid, axis_positions, tri_xy);
        let mut stop_reason = StopReason::ExhaustedTries;
        let mut tries_run = 0;

        'outer: for k in 0..self.config.tries {
            tries_run = k + 1;
            let temp = (self.config.max_temp * (1.0 - k as f64 / self.config.tries as f64)).max(ANNEAL_TEMP_FLOOR);

            for i in 0..self.ranges.len() {
                let (target, mut v_min, mut v_max) = self.ranges[i];
                let caltype_state = flags.get(target.caltype());
                if !caltype_state.active {
                    continue;
                }

                let current = target.get(&state.settings());
                let best = {
                    let settings_snapshot = state.settings();
                    binary_search_optimum(v_min, v_max, self.config.binsearch_width, ANNEAL_VARIABLE_TARGET_MM, ANNEAL_MAX_BINSEARCH_ROUNDS, |value| {
                        let mut candidate = settings_snapshot;
                        target.set(&mut candidate, value);
                        state.apply_trial(&candidate);
                        let plane = TiltPlane::with_shimming(tri_xy, candidate.virtual_shimming);
                        simulate_fk_energy(state.arm(), grid, axis_positions, candidate.trim, Some(&plane))
                    })
                };

                let diff = best - current;
                let mut step = rng.gen_range(0.0..1.0) * temp * caltype_state.annealing_temp_mul + 0.001;
                if step > diff.abs() {
                    step /= self.config.overrun_divisor;
                }
                let new_value = current + diff.signum() * step;

                let mut candidate = state.settings();
                target.set(&mut candidate, new_value);
                state.apply_full(candidate)?;

                v_min = new_value - ANNEAL_INITIAL_HALF_WIDTH_MM;
                v_max = new_value + ANNEAL_INITIAL_HALF_WIDTH_MM;
                self.ranges[i] = (target, v_min, v_max);
            }

            normalize_tower_offsets(state)?;

            // Spec §4.7: re-seat the motion controller's axis position after
            // every full pass, not just on the sampled-energy stride below.
            reseat_motion(state, motion, grid, axis_positions, tri_xy);

            if (k + 1) % ANNEAL_SAMPLE_STRIDE == 0 {
                let energy = current_energy(state, grid, axis_positions, tri_xy);
                last_energy = energy;
                window.push(energy);
                if window.len() > ANNEAL_STALL_WINDOW {
                    window.remove(0);
                }

                if energy <= ANNEAL_GLOBAL_TARGET_MM {
                    stop_reason = StopReason::ReachedGlobalTarget;
                    break 'outer;
                }
                if window.len() == ANNEAL_STALL_WINDOW && stddev(&window) < ANNEAL_STALL_SIGMA {
                    stop_reason = StopReason::Stalled;
                    break 'outer;
                }
                if yielder.flush() {
                    stop_reason = StopReason::Aborted;
                    break 'outer;
                }
            }
        }

        let mut final_settings = state.settings();
        let max_trim = final_settings.trim.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for t in final_settings.trim.iter_mut() {
            *t -= max_trim;
        }
        state.apply_full(final_settings)?;

        Ok(AnnealOutcome { tries_run, final_energy: last_energy, stop_reason })
    }
}

fn current_energy<A: ArmSolution>(
    state: &KinematicState<A>,
    grid: &Grid,
    axis_positions: &AxisPositions,
    tri_xy: [(f64, f64); 3],
) -> f64 {
    let settings = state.settings();
    let plane = TiltPlane::with_shimming(tri_xy, settings.virtual_shimming);
    simulate_fk_energy(state.arm(), grid, axis_positions, settings.trim, Some(&plane))
}

/// After perturbing all three tower_radius_offsets (and, symmetrically,
/// tower_arm_offsets), fold the offset closest to zero into the matching
/// scalar and subtract it from the three offsets (spec.md §4.7).
fn normalize_tower_offsets<A: ArmSolution>(state: &mut KinematicState<A>) -> Result<()> {
    let mut settings = state.settings();

    let closest_to_zero = |values: [f64; 3]| -> usize {
        values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.abs().partial_cmp(&b.abs()).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    };

    let i = closest_to_zero(settings.tower_radius_offset);
    let fold = settings.tower_radius_offset[i];
    if fold != 0.0 {
        for v in settings.tower_radius_offset.iter_mut() {
            *v -= fold;
        }
        settings.delta_radius += fold;
    }

    let j = closest_to_zero(settings.tower_arm_offset);
    let fold_arm = settings.tower_arm_offset[j];
    if fold_arm != 0.0 {
        for v in settings.tower_arm_offset.iter_mut() {
            *v -= fold_arm;
        }
        settings.arm_length += fold_arm;
    }

    state.apply_full(settings)
}

fn reseat_motion<A: ArmSolution, M: MotionController>(
    state: &KinematicState<A>,
    motion: &mut M,
    grid: &Grid,
    axis_positions: &AxisPositions,
    tri_xy: [(f64, f64); 3],
) {
    let settings = state.settings();
    let trim = settings.trim;
    let center = grid.center_index();
    let actuator = axis_positions.get(center);
    let without_trim = [actuator[0] - trim[0], actuator[1] - trim[1], actuator[2] - trim[2]];
    let mut cartesian = state.arm().actuator_to_cartesian(without_trim);
    let plane = TiltPlane::with_shimming(tri_xy, settings.virtual_shimming);
    if plane.enabled {
        cartesian.z -= plane.adjust_z(cartesian.x, cartesian.y);
    }
    motion.reseat(cartesian);
}

fn stddev(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point3D, Shape};
    use crate::kinematics::{CaltypeState, KinematicSettings};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct LinearArm {
        gain: f64,
    }

    impl ArmSolution for LinearArm {
        fn apply(&mut self, _settings: &KinematicSettings) {}
        fn cartesian_to_actuator(&self, position: Point3D) -> [f64; 3] {
            [position.z * self.gain; 3]
        }
        fn actuator_to_cartesian(&self, actuator: [f64; 3]) -> Point3D {
            Point3D::new(0.0, 0.0, actuator[0] / self.gain)
        }
    }

    struct FakeMotion {
        last_reseat: Option<Point3D>,
    }
    impl MotionController for FakeMotion {
        fn reseat(&mut self, position: Point3D) {
            self.last_reseat = Some(position);
        }
        fn set_z_max(&mut self, _z_max: f64) {}
    }

    const TEST_TRI_XY: [(f64, f64); 3] = [(-86.6, -50.0), (86.6, -50.0), (0.0, 100.0)];

    #[test]
    fn rejects_out_of_range_config() {
        assert!(AnnealConfig::new(5, 1.0, 0.3, 2.0).is_err());
        assert!(AnnealConfig::new(100, 5.0, 0.3, 2.0).is_err());
    }

    #[test]
    fn run_reduces_energy_on_a_biased_trim() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.05_f64; grid.len()];
        let arm = LinearArm { gain: 1.0 };
        let axis_positions = crate::energy::simulate_ik(&arm, &grid, &depths, None, [0.0; 3]);

        let mut state = KinematicState::new(LinearArm { gain: 1.0 }, KinematicSettings::new(200.0, 120.0));
        let initial_energy = current_energy(&state, &grid, &axis_positions, TEST_TRI_XY);

        let mut flags = CaltypeFlags::all_inactive();
        flags.endstop = CaltypeState::new(true, 10.0);

        let config = AnnealConfig::new(40, 1.0, 0.3, 2.0).unwrap();
        let mut annealer = Annealer::new(config, &flags, &state.settings());
        let mut motion = FakeMotion { last_reseat: None };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut yielder = NoopYield;

        let outcome = annealer
            .run(&mut state, &mut motion, &grid, &axis_positions, TEST_TRI_XY, &flags, &mut rng, &mut yielder)
            .unwrap();

        assert!(outcome.final_energy <= initial_energy + 1e-9);
        let max_trim = state.settings().trim.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(max_trim, 0.0);
    }

    #[test]
    fn no_active_caltypes_is_a_no_op_schedule() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.0_f64; grid.len()];
        let arm = LinearArm { gain: 1.0 };
        let axis_positions = crate::energy::simulate_ik(&arm, &grid, &depths, None, [0.0; 3]);

        let mut state = KinematicState::new(LinearArm { gain: 1.0 }, KinematicSettings::new(200.0, 120.0));
        let flags = CaltypeFlags::all_inactive();
        let config = AnnealConfig::new(10, 1.0, 0.3, 2.0).unwrap();
        let mut annealer = Annealer::new(config, &flags, &state.settings());
        assert_eq!(annealer.active_target_count(), 0);

        let mut motion = FakeMotion { last_reseat: None };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut yielder = NoopYield;
        let outcome = annealer
            .run(&mut state, &mut motion, &grid, &axis_positions, TEST_TRI_XY, &flags, &mut rng, &mut yielder)
            .unwrap();
        assert_eq!(outcome.final_energy, 0.0);
    }

    #[test]
    fn virtual_shimming_caltype_moves_the_energy_landscape() {
        // A tilted bed: depths increase linearly from the Y=+100 tower
        // toward the Y=-50 towers. No endstop/delta-radius error, so only
        // a plane tilt can reduce energy; the caltype must therefore
        // actually participate in scoring (not anneal over a flat
        // landscape) for this to converge below the un-annealed baseline.
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let mut depths = vec![0.0_f64; grid.len()];
        for idx in grid.active_indices() {
            let p = grid.point(idx).coord;
            depths[idx] = p.y * 0.002;
        }
        let arm = LinearArm { gain: 1.0 };
        let axis_positions = crate::energy::simulate_ik(&arm, &grid, &depths, None, [0.0; 3]);

        let mut state = KinematicState::new(LinearArm { gain: 1.0 }, KinematicSettings::new(200.0, 120.0));
        let initial_energy = current_energy(&state, &grid, &axis_positions, TEST_TRI_XY);

        let mut flags = CaltypeFlags::all_inactive();
        flags.virtual_shimming = CaltypeState::new(true, 20.0);

        let config = AnnealConfig::new(200, 1.5, 0.3, 2.0).unwrap();
        let mut annealer = Annealer::new(config, &flags, &state.settings());
        let mut motion = FakeMotion { last_reseat: None };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut yielder = NoopYield;

        let outcome = annealer
            .run(&mut state, &mut motion, &grid, &axis_positions, TEST_TRI_XY, &flags, &mut rng, &mut yielder)
            .unwrap();

        assert!(
            outcome.final_energy < initial_energy * 0.5,
            "virtual shimming caltype should substantially reduce tilt energy: {} -> {}",
            initial_energy,
            outcome.final_energy
        );
        assert_ne!(state.settings().virtual_shimming, [0.0; 3]);
    }
}
