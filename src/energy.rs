//! Energy model & FK simulator: the annealer evaluates candidate kinematic
//! settings purely by re-projecting a frozen set of per-point axis
//! positions, captured once per real probing pass (spec.md §4.6).

use crate::geometry::{Grid, Point3D};
use crate::kinematics::ArmSolution;
use crate::surface::TiltPlane;

/// Per-point, per-axis carriage heights captured by [`simulate_ik`], frozen
/// for the duration of an annealing run. INACTIVE/ACTIVE_NEIGHBOR entries
/// are zero and excluded from energy.
#[derive(Debug, Clone)]
pub struct AxisPositions {
    values: Vec<[f64; 3]>,
}

impl AxisPositions {
    pub fn new(n_points: usize) -> Self {
        Self { values: vec![[0.0; 3]; n_points] }
    }

    pub fn get(&self, index: usize) -> [f64; 3] {
        self.values[index]
    }

    pub fn set(&mut self, index: usize, value: [f64; 3]) {
        self.values[index] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Capture axis positions for every ACTIVE grid point: the measured relative
/// depth (plus the plane-tilt term, if the plane is enabled) becomes an
/// effective Cartesian z; the arm-solution's inverse kinematics turns that
/// into per-tower carriage heights, to which `trim` is added componentwise.
pub fn simulate_ik<A: ArmSolution>(
    arm: &A,
    grid: &Grid,
    measured_depths: &[f64],
    plane: Option<&TiltPlane>,
    trim: [f64; 3],
) -> AxisPositions {
    let mut axis_positions = AxisPositions::new(grid.len());
    for idx in grid.active_indices() {
        let p = grid.point(idx).coord;
        let mut z = measured_depths[idx];
        if let Some(plane) = plane {
            if plane.enabled {
                z += plane.adjust_z(p.x, p.y);
            }
        }
        let actuator = arm.cartesian_to_actuator(Point3D::new(p.x, p.y, z));
        axis_positions.set(idx, [actuator[0] + trim[0], actuator[1] + trim[1], actuator[2] + trim[2]]);
    }
    axis_positions
}

/// Re-project the frozen `axis_positions` through the arm-solution's forward
/// kinematics under `candidate`'s already-applied settings, and return the
/// mean absolute Z deviation over ACTIVE points -- the annealer's energy.
pub fn simulate_fk_energy<A: ArmSolution>(
    arm: &A,
    grid: &Grid,
    axis_positions: &AxisPositions,
    trim: [f64; 3],
    plane: Option<&TiltPlane>,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for idx in grid.active_indices() {
        let actuator = axis_positions.get(idx);
        let without_trim = [actuator[0] - trim[0], actuator[1] - trim[1], actuator[2] - trim[2]];
        let cartesian = arm.actuator_to_cartesian(without_trim);
        let mut z = cartesian.z;
        if let Some(plane) = plane {
            if plane.enabled {
                z -= plane.adjust_z(cartesian.x, cartesian.y);
            }
        }
        sum += z.abs();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use crate::kinematics::KinematicSettings;

    /// An identity arm: actuator heights equal the Cartesian z on each of
    /// the three towers, trim-free; FK is the exact inverse of IK.
    struct IdentityArm;

    impl ArmSolution for IdentityArm {
        fn apply(&mut self, _settings: &KinematicSettings) {}
        fn cartesian_to_actuator(&self, position: Point3D) -> [f64; 3] {
            [position.z; 3]
        }
        fn actuator_to_cartesian(&self, actuator: [f64; 3]) -> Point3D {
            Point3D::new(0.0, 0.0, actuator[0])
        }
    }

    #[test]
    fn perfect_roundtrip_has_zero_energy() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.2_f64; grid.len()];
        let arm = IdentityArm;
        let trim = [0.0; 3];

        let axis_positions = simulate_ik(&arm, &grid, &depths, None, trim);
        let energy = simulate_fk_energy(&arm, &grid, &axis_positions, trim, None);
        assert!((energy - 0.2).abs() < 1e-9, "identity FK should reproduce the measured depth as residual");
    }

    #[test]
    fn zero_depths_round_trip_to_zero_energy() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.0_f64; grid.len()];
        let arm = IdentityArm;
        let trim = [0.0; 3];

        let axis_positions = simulate_ik(&arm, &grid, &depths, None, trim);
        let energy = simulate_fk_energy(&arm, &grid, &axis_positions, trim, None);
        assert_eq!(energy, 0.0);
    }

    #[test]
    fn trim_cancels_out_of_the_round_trip() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.1_f64; grid.len()];
        let arm = IdentityArm;
        let trim = [-0.4, -0.1, 0.0];

        let axis_positions = simulate_ik(&arm, &grid, &depths, None, trim);
        let energy = simulate_fk_energy(&arm, &grid, &axis_positions, trim, None);
        assert!((energy - 0.1).abs() < 1e-9, "trim added during IK and removed during FK should cancel");
    }

    #[test]
    fn axis_positions_are_zero_outside_active_points() {
        let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
        let depths = vec![0.3_f64; grid.len()];
        let arm = IdentityArm;
        let axis_positions = simulate_ik(&arm, &grid, &depths, None, [0.0; 3]);
        // index 0 is an inactive corner for this grid configuration.
        assert_eq!(axis_positions.get(0), [0.0, 0.0, 0.0]);
    }
}
