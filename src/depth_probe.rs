//! Depth-map probing: measuring a Z correction at every active grid point
//! relative to the center, with active-neighbor extrapolation and radial
//! propagation into inactive cells (spec.md §4.4).

use crate::error::Result;
use crate::geometry::{Classification, Grid, Shape};
use crate::probe::{ProbeAdapter, ProbeDriver};
use crate::surface::DepthMap;

/// Summary of a completed [`probe_surface`] pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthProbeReport {
    /// The raw step count measured at the center point -- the reference
    /// every other point's relative depth is computed against.
    pub origin_steps: i64,
    pub active_probed: usize,
    pub neighbors_extrapolated: usize,
}

/// Measure a Z correction at every active point of `grid` and write it into
/// `depth_map`. Assumes the caller has already homed and descended to the
/// probing height (that orchestration belongs to the motion controller, not
/// this module).
///
/// When `extrapolate_neighbors` is true, ACTIVE_NEIGHBOR points are filled in
/// by probing on the probing radius and extrapolating along the slope to
/// their horizontally adjacent ACTIVE point; otherwise they are left at
/// zero. For a CIRCLE grid, any remaining INACTIVE cell is then filled by
/// copying the nearest inward cell along its row.
pub fn probe_surface<D: ProbeDriver>(
    adapter: &mut ProbeAdapter<D>,
    grid: &Grid,
    depth_map: &mut DepthMap,
    extrapolate_neighbors: bool,
) -> Result<DepthProbeReport> {
    adapter.prime();
    let center = grid.point(grid.center_index()).coord;
    let origin_steps = adapter.probe_at(center.x, center.y)?;
    let origin_abs = adapter.driver().steps_to_mm(origin_steps);

    let mut abs_mm = vec![0.0_f64; grid.len()];
    let mut active_probed = 0;
    for idx in grid.active_indices() {
        let p = grid.point(idx).coord;
        let steps = adapter.probe_at(p.x, p.y)?;
        let abs = adapter.driver().steps_to_mm(steps);
        abs_mm[idx] = abs;
        depth_map.set(idx, adapter.driver().steps_to_mm(origin_steps - steps));
        active_probed += 1;
    }

    let mut neighbors_extrapolated = 0;
    if extrapolate_neighbors {
        let n = grid.n();
        let half = (n - 1) / 2;
        let r = grid.probe_radius();

        for idx in grid.active_neighbor_indices() {
            let (row, col) = grid.row_col(idx);
            let p = grid.point(idx).coord;

            let step_dir: isize = if col > half { -1 } else { 1 };
            let mut a_idx = None;
            let mut c = col as isize + step_dir;
            while c >= 0 && (c as usize) < n {
                let candidate = row * n + c as usize;
                if matches!(grid.classification(candidate), Classification::Active | Classification::Center) {
                    a_idx = Some(candidate);
                    break;
                }
                c += step_dir;
            }
            let Some(a_idx) = a_idx else { continue };
            let a = grid.point(a_idx).coord;

            let sign = if p.x < 0.0 { -1.0 } else { 1.0 };
            let x_prime = sign * (r * r - p.y * p.y).max(0.0).sqrt();

            let steps_prime = adapter.probe_at(x_prime, p.y)?;
            let abs_prime = adapter.driver().steps_to_mm(steps_prime);

            let rise = (abs_prime - abs_mm[a_idx]).abs();
            let denom = (x_prime - a.x).abs();
            let multiplier = if denom > 0.0 { (p.x - a.x).abs() / denom } else { 0.0 };
            let abs_p = abs_mm[a_idx] + rise * multiplier;

            abs_mm[idx] = abs_p;
            depth_map.set(idx, origin_abs - abs_p);
            neighbors_extrapolated += 1;
        }
    } else {
        for idx in grid.active_neighbor_indices() {
            depth_map.set(idx, 0.0);
        }
    }

    if grid.shape() == Shape::Circle {
        propagate_radially(grid, depth_map);
    }

    Ok(DepthProbeReport { origin_steps, active_probed, neighbors_extrapolated })
}

/// Copy each row's values from the centerline outward into any remaining
/// INACTIVE cell, so the saved map is defined across the full grid.
fn propagate_radially(grid: &Grid, depth_map: &mut DepthMap) {
    let n = grid.n();
    let half = (n - 1) / 2;
    for row in 0..n {
        for col in (0..half).rev() {
            let idx = row * n + col;
            if grid.classification(idx) == Classification::Inactive {
                depth_map.set(idx, depth_map.get_raw(idx + 1));
            }
        }
        for col in (half + 1)..n {
            let idx = row * n + col;
            if grid.classification(idx) == Classification::Inactive {
                depth_map.set(idx, depth_map.get_raw(idx - 1));
            }
        }
    }
}
