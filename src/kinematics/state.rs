//! Kinematic state: the sole owner of [`KinematicSettings`] writes.
//!
//! Every mutation here is pushed to the injected [`ArmSolution`]
//! immediately (spec.md §3: "mutated only via the Kinematic State
//! component, which pushes each change to the external arm-solution
//! module"). Re-seating the motion controller after a geometry change is
//! the orchestrating [`crate::engine::CalibrationEngine`]'s job, since that
//! requires both the arm-solution and the motion controller together.

use crate::constants::TRIM_FATAL_LIMIT_MM;
use crate::error::{CalibrationError, Result};
use crate::kinematics::settings::KinematicSettings;
use crate::kinematics::traits::ArmSolution;

/// Owns a [`KinematicSettings`] snapshot and forwards every write to the
/// injected arm-solution module, tracking a "geometry dirty" flag.
pub struct KinematicState<A: ArmSolution> {
    arm: A,
    settings: KinematicSettings,
    geometry_dirty: bool,
}

impl<A: ArmSolution> KinematicState<A> {
    /// Construct kinematic state over an already-applied arm solution.
    pub fn new(mut arm: A, settings: KinematicSettings) -> Self {
        arm.apply(&settings);
        Self { arm, settings, geometry_dirty: false }
    }

    pub fn settings(&self) -> KinematicSettings {
        self.settings
    }

    pub fn arm(&self) -> &A {
        &self.arm
    }

    pub fn is_geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    /// Mark geometry dirty (M665/M666 in spec.md §6).
    pub fn mark_geometry_dirty(&mut self) {
        self.geometry_dirty = true;
    }

    /// Clear the dirty flag -- only the iterative calibrator clears it,
    /// and only after it converges (spec.md §5).
    pub fn clear_geometry_dirty(&mut self) {
        self.geometry_dirty = false;
    }

    fn require_initialized(&self) -> Result<()> {
        if self.settings.initialized {
            Ok(())
        } else {
            Err(CalibrationError::Uninitialized)
        }
    }

    /// Normalize `trim` (subtract its max so `max(trim) == 0`), reject
    /// values below -5 mm as fatal, and push the result into the
    /// arm-solution.
    pub fn set_trim(&mut self, trim: [f64; 3]) -> Result<()> {
        self.require_initialized()?;
        let normalized = normalize_trim(trim)?;
        self.settings.trim = normalized;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn set_delta_radius(&mut self, delta_radius: f64) -> Result<()> {
        self.require_initialized()?;
        self.settings.delta_radius = delta_radius;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn set_arm_length(&mut self, arm_length: f64) -> Result<()> {
        self.require_initialized()?;
        self.settings.arm_length = arm_length;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn set_tower_radius_offset(&mut self, offsets: [f64; 3]) -> Result<()> {
        self.require_initialized()?;
        self.settings.tower_radius_offset = offsets;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn set_tower_angle_offset(&mut self, offsets: [f64; 3]) -> Result<()> {
        self.require_initialized()?;
        self.settings.tower_angle_offset = offsets;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn set_tower_arm_offset(&mut self, offsets: [f64; 3]) -> Result<()> {
        self.require_initialized()?;
        self.settings.tower_arm_offset = offsets;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }

    /// Record the virtual-shimming triplet the annealer converged on. This
    /// does not touch the arm solution -- the plane correction lives in
    /// [`crate::surface::SurfaceTransform`], which the engine keeps in sync.
    pub fn set_virtual_shimming(&mut self, shimming: [f64; 3]) {
        self.settings.virtual_shimming = shimming;
    }

    /// Push `candidate` into the arm-solution for scoring purposes only --
    /// does not touch the kept settings snapshot or the dirty flag. Used by
    /// the annealer's binary search to evaluate trial perturbations; the
    /// real value is only committed via [`KinematicState::apply_full`],
    /// which re-applies the arm-solution from the official snapshot
    /// afterward.
    pub fn apply_trial(&mut self, candidate: &KinematicSettings) {
        self.arm.apply(candidate);
    }

    /// Atomically replace the whole snapshot (used by the annealer to
    /// commit an accepted candidate). Trim is normalized and range-checked
    /// exactly as in [`KinematicState::set_trim`].
    pub fn apply_full(&mut self, mut candidate: KinematicSettings) -> Result<()> {
        candidate.trim = normalize_trim(candidate.trim)?;
        candidate.initialized = true;
        self.settings = candidate;
        self.arm.apply(&self.settings);
        self.geometry_dirty = true;
        Ok(())
    }
}

fn normalize_trim(trim: [f64; 3]) -> Result<[f64; 3]> {
    let max = trim.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let normalized = [trim[0] - max, trim[1] - max, trim[2] - max];
    const AXES: [&str; 3] = ["X", "Y", "Z"];
    for (i, &v) in normalized.iter().enumerate() {
        if v < TRIM_FATAL_LIMIT_MM {
            return Err(CalibrationError::GeometryOutOfRange { axis: AXES[i], value: v });
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3D;

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

    #[test]
    fn trim_write_is_always_normalized() {
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::new(200.0, 120.0));
        state.set_trim([-0.5, -0.2, 0.0]).unwrap();
        let max = state.settings().trim.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(max, 0.0);
    }

    #[test]
    fn trim_below_fatal_limit_is_rejected() {
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::new(200.0, 120.0));
        let err = state.set_trim([-10.0, 0.0, -2.0]).unwrap_err();
        assert!(matches!(err, CalibrationError::GeometryOutOfRange { .. }));
    }

    #[test]
    fn write_on_uninitialized_settings_fails() {
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::uninitialized());
        assert!(matches!(state.set_delta_radius(130.0), Err(CalibrationError::Uninitialized)));
    }

    #[test]
    fn any_write_marks_geometry_dirty() {
        let mut state = KinematicState::new(FakeArm::default(), KinematicSettings::new(200.0, 120.0));
        assert!(!state.is_geometry_dirty());
        state.set_arm_length(205.0).unwrap();
        assert!(state.is_geometry_dirty());
    }
}
