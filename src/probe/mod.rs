//! The Z-probe driver adapter and the tools built on top of it
//! (spec.md §4.2, §4.8).

mod config;
mod driver;
mod repeatability;

pub use config::ProbeConfig;
pub use driver::{ProbeAdapter, ProbeDriver};
pub use repeatability::{ProbeRepeatabilityReport, ProbeRepeatabilityTool};
