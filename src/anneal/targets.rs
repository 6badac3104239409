//! The tagged-enum optimization target (spec.md §9 redesign flag: replace
//! pointer-to-member dispatch over scalar kinematic variables with an
//! explicit enum match).

use crate::geometry::Tower;
use crate::kinematics::{Caltype, KinematicSettings};

#[inline]
fn axis(tower: Tower) -> usize {
    match tower {
        Tower::X => 0,
        Tower::Y => 1,
        Tower::Z => 2,
    }
}

/// A single scalar variable the annealer can perturb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationTarget {
    Endstop(Tower),
    DeltaRadius,
    TowerRadiusOffset(Tower),
    ArmLength,
    TowerArmOffset(Tower),
    TowerAngleOffset(Tower),
    VirtualShimming(Tower),
}

impl OptimizationTarget {
    /// The [`Caltype`] switch that must be active for this target to be
    /// annealed, and whose temperature multiplier governs its step size.
    pub fn caltype(self) -> Caltype {
        match self {
            OptimizationTarget::Endstop(_) => Caltype::Endstop,
            OptimizationTarget::DeltaRadius | OptimizationTarget::TowerRadiusOffset(_) => Caltype::DeltaRadius,
            OptimizationTarget::ArmLength | OptimizationTarget::TowerArmOffset(_) => Caltype::ArmLength,
            OptimizationTarget::TowerAngleOffset(_) => Caltype::TowerAngle,
            OptimizationTarget::VirtualShimming(_) => Caltype::VirtualShimming,
        }
    }

    pub fn get(self, settings: &KinematicSettings) -> f64 {
        match self {
            OptimizationTarget::Endstop(t) => settings.trim[axis(t)],
            OptimizationTarget::DeltaRadius => settings.delta_radius,
            OptimizationTarget::TowerRadiusOffset(t) => settings.tower_radius_offset[axis(t)],
            OptimizationTarget::ArmLength => settings.arm_length,
            OptimizationTarget::TowerArmOffset(t) => settings.tower_arm_offset[axis(t)],
            OptimizationTarget::TowerAngleOffset(t) => settings.tower_angle_offset[axis(t)],
            OptimizationTarget::VirtualShimming(t) => settings.virtual_shimming[axis(t)],
        }
    }

    pub fn set(self, settings: &mut KinematicSettings, value: f64) {
        match self {
            OptimizationTarget::Endstop(t) => settings.trim[axis(t)] = value,
            OptimizationTarget::DeltaRadius => settings.delta_radius = value,
            OptimizationTarget::TowerRadiusOffset(t) => settings.tower_radius_offset[axis(t)] = value,
            OptimizationTarget::ArmLength => settings.arm_length = value,
            OptimizationTarget::TowerArmOffset(t) => settings.tower_arm_offset[axis(t)] = value,
            OptimizationTarget::TowerAngleOffset(t) => settings.tower_angle_offset[axis(t)] = value,
            OptimizationTarget::VirtualShimming(t) => settings.virtual_shimming[axis(t)] = value,
        }
    }
}

/// Every scalar variable whose [`Caltype`] is active in `flags`, in a fixed
/// order: endstops, delta radius (+ tower radius offsets), arm length (+
/// tower arm offsets), tower-angle offsets, virtual shimming.
pub fn active_targets(flags: &crate::kinematics::CaltypeFlags) -> Vec<OptimizationTarget> {
    const TOWERS: [Tower; 3] = [Tower::X, Tower::Y, Tower::Z];
    let mut targets = Vec::new();

    if flags.is_active(Caltype::Endstop) {
        targets.extend(TOWERS.iter().map(|&t| OptimizationTarget::Endstop(t)));
    }
    if flags.is_active(Caltype::DeltaRadius) {
        targets.push(OptimizationTarget::DeltaRadius);
        targets.extend(TOWERS.iter().map(|&t| OptimizationTarget::TowerRadiusOffset(t)));
    }
    if flags.is_active(Caltype::ArmLength) {
        targets.push(OptimizationTarget::ArmLength);
        targets.extend(TOWERS.iter().map(|&t| OptimizationTarget::TowerArmOffset(t)));
    }
    if flags.is_active(Caltype::TowerAngle) {
        targets.extend(TOWERS.iter().map(|&t| OptimizationTarget::TowerAngleOffset(t)));
    }
    if flags.is_active(Caltype::VirtualShimming) {
        targets.extend(TOWERS.iter().map(|&t| OptimizationTarget::VirtualShimming(t)));
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::CaltypeFlags;

    #[test]
    fn inactive_flags_produce_no_targets() {
        let flags = CaltypeFlags::all_inactive();
        assert!(active_targets(&flags).is_empty());
    }

    #[test]
    fn get_and_set_round_trip_for_every_target() {
        let mut settings = KinematicSettings::new(200.0, 120.0);
        for &target in &[
            OptimizationTarget::Endstop(Tower::X),
            OptimizationTarget::DeltaRadius,
            OptimizationTarget::TowerRadiusOffset(Tower::Y),
            OptimizationTarget::ArmLength,
            OptimizationTarget::TowerArmOffset(Tower::Z),
            OptimizationTarget::TowerAngleOffset(Tower::X),
            OptimizationTarget::VirtualShimming(Tower::Y),
        ] {
            target.set(&mut settings, 4.5);
            assert_eq!(target.get(&settings), 4.5);
        }
    }
}
