//! The kinematic parameter snapshot (spec.md §3 data model).

/// A full snapshot of the tunable delta-kinematics parameters.
///
/// Trim entries are always `<= 0` and normalized so that
/// `max(trim[X], trim[Y], trim[Z]) == 0` -- see [`crate::kinematics::KinematicState::set_trim`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KinematicSettings {
    pub arm_length: f64,
    pub delta_radius: f64,
    pub trim: [f64; 3],
    pub tower_radius_offset: [f64; 3],
    pub tower_angle_offset: [f64; 3],
    pub tower_arm_offset: [f64; 3],
    pub virtual_shimming: [f64; 3],
    pub initialized: bool,
}

impl KinematicSettings {
    /// An uninitialized snapshot -- all zero, `initialized = false`.
    pub fn uninitialized() -> Self {
        Self {
            arm_length: 0.0,
            delta_radius: 0.0,
            trim: [0.0; 3],
            tower_radius_offset: [0.0; 3],
            tower_angle_offset: [0.0; 3],
            tower_arm_offset: [0.0; 3],
            virtual_shimming: [0.0; 3],
            initialized: false,
        }
    }

    /// Construct an initialized snapshot from nominal machine geometry.
    pub fn new(arm_length: f64, delta_radius: f64) -> Self {
        Self {
            arm_length,
            delta_radius,
            initialized: true,
            ..Self::uninitialized()
        }
    }
}

impl Default for KinematicSettings {
    fn default() -> Self {
        Self::uninitialized()
    }
}

/// One of the five independently-switchable annealing targets (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Caltype {
    Endstop,
    DeltaRadius,
    ArmLength,
    TowerAngle,
    VirtualShimming,
}

/// Whether a [`Caltype`] participates in annealing, and how aggressively.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaltypeState {
    pub active: bool,
    /// Annealing-temperature multiplier, clamped to [0, 50].
    pub annealing_temp_mul: f64,
}

impl CaltypeState {
    pub fn new(active: bool, annealing_temp_mul: f64) -> Self {
        Self {
            active,
            annealing_temp_mul: annealing_temp_mul.clamp(0.0, crate::constants::ANNEAL_TEMP_MUL_MAX),
        }
    }

    pub fn inactive() -> Self {
        Self { active: false, annealing_temp_mul: 0.0 }
    }
}

/// The five independent caltype switches.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaltypeFlags {
    pub endstop: CaltypeState,
    pub delta_radius: CaltypeState,
    pub arm_length: CaltypeState,
    pub tower_angle: CaltypeState,
    pub virtual_shimming: CaltypeState,
}

impl CaltypeFlags {
    pub fn all_inactive() -> Self {
        Self {
            endstop: CaltypeState::inactive(),
            delta_radius: CaltypeState::inactive(),
            arm_length: CaltypeState::inactive(),
            tower_angle: CaltypeState::inactive(),
            virtual_shimming: CaltypeState::inactive(),
        }
    }

    pub fn get(&self, caltype: Caltype) -> CaltypeState {
        match caltype {
            Caltype::Endstop => self.endstop,
            Caltype::DeltaRadius => self.delta_radius,
            Caltype::ArmLength => self.arm_length,
            Caltype::TowerAngle => self.tower_angle,
            Caltype::VirtualShimming => self.virtual_shimming,
        }
    }

    pub fn is_active(&self, caltype: Caltype) -> bool {
        self.get(caltype).active
    }
}

impl Default for CaltypeFlags {
    fn default() -> Self {
        Self::all_inactive()
    }
}
