//! # deltacal -- Delta Kinematic Auto-Calibration Kernel
//!
//! The calibration kernel for a linear-delta 3D printer: a probe grid, a
//! probe-driver adapter, kinematic state, a bilinearly-interpolated surface
//! transform, depth-map probing, an iterative (classical) endstop/radius
//! corrector, an energy model driven by a forward-kinematics simulator, a
//! parallel coordinate-descent simulated annealer, and a probe-repeatability
//! characterization tool.
//!
//! ## Quick Start
//!
//! ```
//! use deltacal::prelude::*;
//!
//! let grid = Grid::build(100.0, 5, Shape::Circle).unwrap();
//! assert_eq!(grid.len(), 25);
//! assert_eq!(grid.classification(grid.center_index()), Classification::Center);
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`geometry`] -- Probe grid: point classification, tower points, nearest-point lookup.
//! - [`probe`] -- Probe-driver adapter (smoothing, priming, offset) and repeatability tool.
//! - [`kinematics`] -- Kinematic parameter snapshot and the injected arm-solution/motion traits.
//! - [`surface`] -- Virtual-shimming plane + bilinear depth-map surface transform.
//! - [`depth_probe`] -- Full-grid depth mapping with active-neighbor extrapolation.
//! - [`iterative`] -- Classical endstop + delta-radius convergence (coarse pre-pass).
//! - [`energy`] -- IK capture + FK re-projection energy model for the annealer.
//! - [`anneal`] -- Parallel coordinate-descent simulated annealer.
//! - [`engine`] -- Top-level façade wiring the above to the external command surface.
//! - [`error`] -- [`CalibrationError`] and the crate-wide `Result` alias.

pub mod anneal;
pub mod constants;
pub mod depth_probe;
pub mod energy;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod iterative;
pub mod kinematics;
pub(crate) mod prefix;
pub mod probe;
pub mod surface;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::anneal::{AnnealConfig, AnnealOutcome, Annealer};
    pub use crate::energy::{simulate_fk_energy, simulate_ik, AxisPositions};
    pub use crate::engine::{CalibrationEngine, CooperativeYield};
    pub use crate::error::{CalibrationError, Result};
    pub use crate::geometry::{Classification, Grid, GridPoint, Point2D, Point3D, Shape, Tower};
    pub use crate::iterative::{iterative_calibrate, IterativeOutcome};
    pub use crate::kinematics::{
        ArmSolution, CaltypeFlags, KinematicSettings, KinematicState, MotionController,
    };
    pub use crate::probe::{ProbeConfig, ProbeDriver, ProbeRepeatabilityReport, ProbeRepeatabilityTool};
    pub use crate::surface::{DepthMap, SurfaceTransform};
}
