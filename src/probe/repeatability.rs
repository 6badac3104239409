//! Probe repeatability characterization (spec.md §4.8).

use crate::constants::REPEATABILITY_MAX_SAMPLES;
use crate::error::Result;
use crate::geometry::{Grid, Tower};
use crate::probe::config::ProbeConfig;
use crate::probe::driver::{ProbeAdapter, ProbeDriver};

/// Statistical summary of a repeatability run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRepeatabilityReport {
    /// Each sample, converted to millimeters.
    pub samples_mm: Vec<f64>,
    pub mean_mm: f64,
    pub sigma_mm: f64,
    /// steps_to_mm(max - min) across the run.
    pub repeatability_mm: f64,
}

/// Runs repeated probes at the origin (optionally interleaved with moves
/// around the tower-near points, to exercise mechanical slop) and reports
/// range/mean/sigma. Tracks the best (lowest sigma) probe configuration
/// observed across invocations.
#[derive(Default)]
pub struct ProbeRepeatabilityTool {
    best: Option<(ProbeConfig, f64)>,
}

impl ProbeRepeatabilityTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_config(&self) -> Option<ProbeConfig> {
        self.best.map(|(cfg, _)| cfg)
    }

    pub fn best_sigma_mm(&self) -> Option<f64> {
        self.best.map(|(_, sigma)| sigma)
    }

    /// Run `samples` probes (clamped to [1, 30]) at the origin.
    /// `interleave` exercises mechanical slop by visiting the X/Y/Z
    /// tower-near grid points between samples.
    pub fn run<D: ProbeDriver>(
        &mut self,
        adapter: &mut ProbeAdapter<D>,
        samples: usize,
        interleave: bool,
        grid: Option<&Grid>,
    ) -> Result<ProbeRepeatabilityReport> {
        let n = samples.max(1).min(REPEATABILITY_MAX_SAMPLES);
        let mut readings_steps = Vec::with_capacity(n);

        for i in 0..n {
            if interleave {
                if let Some(grid) = grid {
                    let tower = match i % 3 {
                        0 => Tower::X,
                        1 => Tower::Y,
                        _ => Tower::Z,
                    };
                    let p = grid.point(grid.tower_point(tower)).coord;
                    let _ = adapter.probe_at(p.x, p.y);
                }
            }
            readings_steps.push(adapter.probe_at(0.0, 0.0)?);
        }

        let min = *readings_steps.iter().min().expect("at least one sample");
        let max = *readings_steps.iter().max().expect("at least one sample");

        let samples_mm: Vec<f64> = readings_steps
            .iter()
            .map(|&steps| adapter.driver().steps_to_mm(steps))
            .collect();
        let mean_mm = samples_mm.iter().sum::<f64>() / samples_mm.len() as f64;
        let variance = samples_mm.iter().map(|v| (v - mean_mm).powi(2)).sum::<f64>() / samples_mm.len() as f64;
        let sigma_mm = variance.sqrt();
        let repeatability_mm = adapter.driver().steps_to_mm(max - min);

        if self.best.is_none_or(|(_, best_sigma)| sigma_mm < best_sigma) {
            self.best = Some((*adapter.config(), sigma_mm));
        }

        Ok(ProbeRepeatabilityReport { samples_mm, mean_mm, sigma_mm, repeatability_mm })
    }
}
