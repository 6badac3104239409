//! Error kinds produced by the calibration kernel.
//!
//! All fallible public operations return [`Result<T>`]. A failure always
//! leaves kinematics in the last applied state -- no top-level command
//! partially mutates [`crate::kinematics::KinematicState`] on its way out.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Everything that can go wrong in the calibration kernel (spec.md §7).
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The underlying probe did not trigger, or the averaged result was
    /// below 100 steps (indicates probe-height misconfiguration).
    #[error("probe failed at ({x:.2}, {y:.2}): {reason}")]
    ProbeFailed { x: f64, y: f64, reason: &'static str },

    /// A requested configuration is structurally invalid, e.g. nonzero
    /// probe X/Y offsets when depth correction was requested.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The depth-map buffer could not be obtained.
    #[error("failed to allocate depth map of {0} entries")]
    AllocationFailed(usize),

    /// A computed trim fell below -5 mm on some axis -- fatal, aborts
    /// calibration.
    #[error("trim {axis} = {value:.4} mm is out of range (< -5 mm)")]
    GeometryOutOfRange { axis: &'static str, value: f64 },

    /// Depth-map file I/O failed, or a loaded value fell outside ±5 mm.
    #[error("depth map I/O error: {0}")]
    IoFailed(String),

    /// Attempted to apply an uninitialized [`crate::kinematics::KinematicSettings`] snapshot.
    #[error("kinematic settings have not been initialized")]
    Uninitialized,
}
