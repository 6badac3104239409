//! Simulated annealer: parallel coordinate descent over the active
//! kinematic variables, driven by a frozen FK energy model (spec.md §4.7).

mod binary_search;
mod schedule;
mod targets;

pub use binary_search::binary_search_optimum;
pub use schedule::{AnnealConfig, AnnealOutcome, Annealer, CooperativeYield, NoopYield, StopReason};
pub use targets::{active_targets, OptimizationTarget};
