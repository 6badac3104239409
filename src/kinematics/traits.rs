//! External-collaborator traits injected into the calibration kernel.
//!
//! These correspond to the out-of-scope collaborators named in spec.md §1:
//! the arm-solution module (forward/inverse kinematics for the delta
//! geometry) and the motion controller (coordinated moves, homing, last
//! known axis position). The kernel only ever holds these as injected
//! dependencies -- see spec.md §9's "global singletons become explicit
//! dependencies" redesign flag.

use crate::geometry::Point3D;
use crate::kinematics::settings::KinematicSettings;

/// The arm-solution module: forward/inverse kinematics for the linear-delta
/// geometry, and the sole target of [`KinematicSettings`] writes.
pub trait ArmSolution {
    /// Push a full kinematic settings snapshot into the arm solution.
    fn apply(&mut self, settings: &KinematicSettings);

    /// Inverse kinematics: Cartesian effector position -> per-tower
    /// carriage (actuator) heights.
    fn cartesian_to_actuator(&self, position: Point3D) -> [f64; 3];

    /// Forward kinematics: per-tower carriage heights -> Cartesian
    /// effector position.
    fn actuator_to_cartesian(&self, actuator: [f64; 3]) -> Point3D;
}

/// The motion controller: executes coordinated moves, homes, and reports
/// axis positions.
pub trait MotionController {
    /// Re-seat the controller's last-known axis position after a geometry
    /// change, preventing a discontinuous jump on the next move.
    fn reseat(&mut self, position: Point3D);

    /// Push a newly-measured bed height as the new Z max.
    fn set_z_max(&mut self, z_max: f64);
}
