//! The top-level façade wiring the kernel's components to the external
//! command surface (spec.md §6): probe repeatability, full-grid depth
//! probing, the iterative pre-pass, heuristic (annealing) calibration, and
//! surface-transform configuration.

use rand::Rng;

use crate::anneal::{AnnealConfig, AnnealOutcome, Annealer};
pub use crate::anneal::CooperativeYield;
use crate::depth_probe::{probe_surface, DepthProbeReport};
use crate::energy::simulate_ik;
use crate::error::{CalibrationError, Result};
use crate::geometry::Grid;
use crate::iterative::{iterative_calibrate as run_iterative, IterativeOutcome};
use crate::kinematics::{ArmSolution, CaltypeFlags, KinematicState, MotionController};
use crate::prefix::{log_line, PrefixGuard};
use crate::probe::{ProbeAdapter, ProbeDriver, ProbeRepeatabilityReport, ProbeRepeatabilityTool};
use crate::surface::SurfaceTransform;

/// Parameters for a heuristic (simulated-annealing) calibration run (G31's
/// K/L/O-S/T-W/Y switches).
pub struct HeuristicCalibrationRequest {
    pub flags: CaltypeFlags,
    pub anneal_config: AnnealConfig,
    /// G31 Y: zero the trim, tower offsets, and virtual shimming before
    /// annealing.
    pub zero_offsets_first: bool,
    /// G31 L: run the schedule and report the outcome without committing it.
    pub simulate_only: bool,
}

/// Wires [`KinematicState`], the probe-driver adapter, the probe grid, and
/// the surface transform together behind the command surface spec.md §6
/// describes. Generic over the three externally-injected collaborators.
pub struct CalibrationEngine<A: ArmSolution, M: MotionController, D: ProbeDriver> {
    state: KinematicState<A>,
    motion: M,
    probe: ProbeAdapter<D>,
    grid: Grid,
    surface: SurfaceTransform,
    repeatability: ProbeRepeatabilityTool,
}

impl<A: ArmSolution, M: MotionController, D: ProbeDriver> CalibrationEngine<A, M, D> {
    pub fn new(state: KinematicState<A>, motion: M, probe: ProbeAdapter<D>, grid: Grid) -> Self {
        let surface = SurfaceTransform::new(&grid);
        Self { state, motion, probe, grid, surface, repeatability: ProbeRepeatabilityTool::new() }
    }

    pub fn state(&self) -> &KinematicState<A> {
        &self.state
    }

    pub fn surface(&self) -> &SurfaceTransform {
        &self.surface
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// M665/M666: mark geometry dirty without otherwise touching settings.
    pub fn mark_geometry_dirty(&mut self) {
        self.state.mark_geometry_dirty();
    }

    /// M667: configure the surface transform's tri-point shim values and
    /// the plane/depth/master enable flags.
    pub fn set_surface_params(
        &mut self,
        shimming: [f64; 3],
        plane_enabled: bool,
        depth_enabled: bool,
        active: bool,
    ) {
        self.surface.set_virtual_shimming(shimming[0], shimming[1], shimming[2]);
        if !plane_enabled {
            self.surface.set_virtual_shimming(0.0, 0.0, 0.0);
        }
        self.surface.set_depth_enabled(depth_enabled);
        self.surface.set_active(active);
    }

    /// M500/M503: the current tri-point Z values and enable flags, as would
    /// be emitted to the save stream as an M667 line.
    pub fn report_surface_params(&self) -> ([f64; 3], bool, bool, bool) {
        let tri = self.surface.tri_points();
        (
            [tri[0].z, tri[1].z, tri[2].z],
            self.surface.plane_enabled(),
            self.surface.depth_enabled(),
            self.surface.active(),
        )
    }

    /// G29: probe repeatability test.
    pub fn probe_repeatability(&mut self, samples: usize, interleave: bool) -> Result<ProbeRepeatabilityReport> {
        let _guard = PrefixGuard::push("PR");
        log_line!("running {samples}-sample repeatability test");
        self.repeatability.run(&mut self.probe, samples, interleave, Some(&self.grid))
    }

    pub fn best_repeatability_config(&self) -> Option<crate::probe::ProbeConfig> {
        self.repeatability.best_config()
    }

    /// G31 A: probe the full grid and render the depth-map save-stream
    /// contents, enabling depth correction. Rejects a probe with a nonzero
    /// XY offset, since depth-map probing assumes the probe and nozzle
    /// coincide in X/Y.
    pub fn probe_grid_and_save(&mut self, extrapolate_neighbors: bool) -> Result<String> {
        if self.probe.config().has_xy_offset() {
            return Err(CalibrationError::ConfigInvalid(
                "depth-map probing requires a probe with zero XY offset".to_string(),
            ));
        }
        let _guard = PrefixGuard::push("DP");
        log_line!("probing full grid (extrapolate_neighbors={extrapolate_neighbors})");
        probe_surface(&mut self.probe, &self.grid, self.surface.depth_map_mut(), extrapolate_neighbors)?;
        self.surface.set_depth_enabled(true);
        self.surface.set_active(true);
        Ok(self.surface.save_depth_map())
    }

    /// G31 Z: probe the full grid and report it, without saving or enabling
    /// depth correction.
    pub fn probe_grid_display(&mut self, extrapolate_neighbors: bool) -> Result<DepthProbeReport> {
        let _guard = PrefixGuard::push("DP");
        let mut scratch = self.surface.depth_map().clone();
        probe_surface(&mut self.probe, &self.grid, &mut scratch, extrapolate_neighbors)
    }

    /// Load a previously-saved depth map from its text representation.
    pub fn load_depth_map(&mut self, contents: &str) -> Result<()> {
        self.surface.load_depth_map(contents)
    }

    /// G32: the classical iterative endstop/delta-radius pre-pass. Clears
    /// the geometry-dirty flag once converged (spec.md §5) -- a non-
    /// converging run leaves it set so a subsequent heuristic pass knows
    /// the arm-solution was touched mid-run.
    pub fn iterative_calibrate(&mut self) -> Result<IterativeOutcome> {
        let _guard = PrefixGuard::push("IT");
        log_line!("starting iterative calibration");
        let outcome = run_iterative(&mut self.probe, &mut self.state, &self.grid)?;
        if outcome.converged() {
            self.state.clear_geometry_dirty();
        }
        log_line!(
            "iterative calibration finished after {} iterations (converged={})",
            outcome.iterations,
            outcome.converged()
        );
        Ok(outcome)
    }

    /// G31 [O-S,T-W,Y]: heuristic (simulated-annealing) calibration. Probes
    /// each ACTIVE point once to capture axis positions, then runs the
    /// annealer's coordinate-descent schedule over the requested caltypes.
    /// With `simulate_only`, the schedule still runs (and its outcome is
    /// reported) but the perturbed settings are discarded in favor of the
    /// pre-run snapshot.
    pub fn heuristic_calibrate<R: Rng, Y: CooperativeYield>(
        &mut self,
        request: HeuristicCalibrationRequest,
        rng: &mut R,
        yielder: &mut Y,
    ) -> Result<AnnealOutcome> {
        let _guard = PrefixGuard::push("AN");

        let pre_run_settings = self.state.settings();
        if request.zero_offsets_first {
            let mut zeroed = pre_run_settings;
            zeroed.trim = [0.0; 3];
            zeroed.tower_radius_offset = [0.0; 3];
            zeroed.tower_angle_offset = [0.0; 3];
            zeroed.tower_arm_offset = [0.0; 3];
            zeroed.virtual_shimming = [0.0; 3];
            self.state.apply_full(zeroed)?;
        } else {
            // Keep the candidate baseline in lockstep with the plane already
            // committed to the surface transform, so the frozen axis
            // positions captured below and the annealer's per-candidate
            // plane (rebuilt from `virtual_shimming` each evaluation) start
            // from the same tilt.
            let tri = self.surface.tri_points();
            self.state.set_virtual_shimming([tri[0].z, tri[1].z, tri[2].z]);
        }

        log_line!("capturing axis positions via inverse kinematics");
        let mut measured_depths = vec![0.0_f64; self.grid.len()];
        for idx in self.grid.active_indices() {
            let p = self.grid.point(idx).coord;
            let steps = self.probe.probe_at(p.x, p.y)?;
            measured_depths[idx] = self.probe.driver().steps_to_mm(steps);
        }
        let plane = self.surface.plane_enabled().then(|| *self.surface_plane());
        let axis_positions = simulate_ik(self.state.arm(), &self.grid, &measured_depths, plane.as_ref(), self.state.settings().trim);
        let tri_xy = self.surface_plane().tri_xy();

        let active_count = crate::anneal::active_targets(&request.flags).len();
        log_line!("annealing {active_count} active variables over {} tries", request.anneal_config.tries);
        let mut annealer = Annealer::new(request.anneal_config, &request.flags, &self.state.settings());
        let outcome = annealer.run(
            &mut self.state,
            &mut self.motion,
            &self.grid,
            &axis_positions,
            tri_xy,
            &request.flags,
            rng,
            yielder,
        )?;

        if request.simulate_only {
            self.state.apply_full(pre_run_settings)?;
        } else {
            let shimming = self.state.settings().virtual_shimming;
            self.surface.set_virtual_shimming(shimming[0], shimming[1], shimming[2]);
        }

        log_line!("heuristic calibration finished: energy={:.5} mm, converged={}", outcome.final_energy, outcome.converged());
        Ok(outcome)
    }

    fn surface_plane(&self) -> &crate::surface::TiltPlane {
        // `SurfaceTransform` does not expose the plane directly since the
        // public contract is `get_adjust_z`; the annealer's energy model
        // needs the raw plane to mirror the IK/FK tilt term, so it is
        // reconstructed once here rather than widening `SurfaceTransform`'s
        // public surface for a single internal caller.
        self.surface.plane_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point3D, Shape};
    use crate::kinematics::{CaltypeState, KinematicSettings};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct FakeArm;
    impl ArmSolution for FakeArm {
        fn apply(&mut self, _settings: &KinematicSettings) {}
        fn cartesian_to_actuator(&self, position: Point3D) -> [f64; 3] {
            [position.z; 3]
        }
        fn actuator_to_cartesian(&self, actuator: [f64; 3]) -> Point3D {
            Point3D::new(0.0, 0.0, actuator[0])
        }
    }

    struct FakeMotion;
    impl MotionController for FakeMotion {
        fn reseat(&mut self, _position: Point3D) {}
        fn set_z_max(&mut self, _z_max: f64) {}
    }

    struct FlatDriver {
        accel: f64,
    }
    impl ProbeDriver for FlatDriver {
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

    fn engine() -> CalibrationEngine<FakeArm, FakeMotion, FlatDriver> {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let state = KinematicState::new(FakeArm, KinematicSettings::new(200.0, 120.0));
        let config = crate::probe::ProbeConfig::new(1, 0, 1000.0, Point3D::default(), 5.0, 1.0, 20, false).unwrap();
        let probe = ProbeAdapter::new(FlatDriver { accel: 1000.0 }, config);
        CalibrationEngine::new(state, FakeMotion, probe, grid)
    }

    #[test]
    fn offset_probe_rejects_grid_save() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let state = KinematicState::new(FakeArm, KinematicSettings::new(200.0, 120.0));
        let config = crate::probe::ProbeConfig::new(1, 0, 1000.0, Point3D::new(1.0, 0.0, 0.0), 5.0, 1.0, 20, false).unwrap();
        let probe = ProbeAdapter::new(FlatDriver { accel: 1000.0 }, config);
        let mut eng = CalibrationEngine::new(state, FakeMotion, probe, grid);
        assert!(eng.probe_grid_and_save(true).is_err());
    }

    #[test]
    fn flat_bed_grid_save_enables_depth_correction() {
        let mut eng = engine();
        eng.probe_grid_and_save(true).unwrap();
        assert!(eng.surface().depth_enabled());
        assert!(eng.surface().active());
    }

    #[test]
    fn heuristic_calibrate_runs_to_completion() {
        let mut eng = engine();
        let mut flags = CaltypeFlags::all_inactive();
        flags.endstop = CaltypeState::new(true, 5.0);
        let request = HeuristicCalibrationRequest {
            flags,
            anneal_config: AnnealConfig::new(10, 1.0, 0.3, 2.0).unwrap(),
            zero_offsets_first: false,
            simulate_only: false,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut yielder = crate::anneal::NoopYield;
        let outcome = eng.heuristic_calibrate(request, &mut rng, &mut yielder).unwrap();
        assert!(outcome.tries_run > 0);
    }

    #[test]
    fn simulate_only_discards_the_perturbation() {
        let mut eng = engine();
        let before = eng.state().settings();
        let mut flags = CaltypeFlags::all_inactive();
        flags.endstop = CaltypeState::new(true, 5.0);
        let request = HeuristicCalibrationRequest {
            flags,
            anneal_config: AnnealConfig::new(10, 1.0, 0.3, 2.0).unwrap(),
            zero_offsets_first: false,
            simulate_only: true,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut yielder = crate::anneal::NoopYield;
        eng.heuristic_calibrate(request, &mut rng, &mut yielder).unwrap();
        assert_eq!(eng.state().settings(), before);
    }
}
