//! The combined surface transform: virtual-shimming plane + depth map.

use crate::error::{CalibrationError, Result};
use crate::geometry::Grid;
use crate::surface::depth_map::DepthMap;
use crate::surface::plane::TiltPlane;

/// Stores the virtual-shimming tilt plane and the N x N depth map, and
/// computes the combined Z correction applied in the motion hot path.
///
/// Per spec.md §4.3, [`SurfaceTransform::get_adjust_z`] must be
/// allocation-free and branch-cheap: no heap traffic, a handful of
/// `f64` comparisons.
#[derive(Debug, Clone)]
pub struct SurfaceTransform {
    plane: TiltPlane,
    depth_map: DepthMap,
    depth_enabled: bool,
    active: bool,
}

impl SurfaceTransform {
    /// Construct a disabled transform over `grid`'s geometry. The plane's
    /// three anchors are fixed at the grid's tower-near points.
    pub fn new(grid: &Grid) -> Self {
        use crate::geometry::Tower;

        let tx = grid.point(grid.tower_point(Tower::X)).coord;
        let ty = grid.point(grid.tower_point(Tower::Y)).coord;
        let tz = grid.point(grid.tower_point(Tower::Z)).coord;

        Self {
            plane: TiltPlane::flat([(tx.x, tx.y), (ty.x, ty.y), (tz.x, tz.y)]),
            depth_map: DepthMap::new(grid.n(), grid.probe_radius(), grid.scale()),
            depth_enabled: false,
            active: false,
        }
    }

    pub fn plane_enabled(&self) -> bool {
        self.plane.enabled
    }

    pub fn depth_enabled(&self) -> bool {
        self.depth_enabled
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_depth_enabled(&mut self, enabled: bool) {
        self.depth_enabled = enabled;
    }

    pub fn depth_map(&self) -> &DepthMap {
        &self.depth_map
    }

    pub fn depth_map_mut(&mut self) -> &mut DepthMap {
        &mut self.depth_map
    }

    /// Assign (sx, sy, sz) to the three tri-point anchors; see
    /// [`TiltPlane::set_shimming`].
    pub fn set_virtual_shimming(&mut self, sx: f64, sy: f64, sz: f64) {
        self.plane.set_shimming(sx, sy, sz);
    }

    pub fn tri_points(&self) -> [crate::geometry::Point3D; 3] {
        self.plane.tri_points
    }

    /// The raw tilt plane, for callers (the energy model) that must mirror
    /// the exact plane-tilt term applied in the motion hot path.
    pub(crate) fn plane_ref(&self) -> &TiltPlane {
        &self.plane
    }

    /// The combined Z correction at (x, y): plane-tilt term plus bilinear
    /// depth-map term, each included only when its sub-flag and the master
    /// `active` flag both hold (spec.md data-model invariant).
    #[inline]
    pub fn get_adjust_z(&self, x: f64, y: f64) -> f64 {
        if !self.active {
            return 0.0;
        }
        let mut z = 0.0;
        if self.plane.enabled {
            z += self.plane.adjust_z(x, y);
        }
        if self.depth_enabled {
            z += self.depth_map.sample(x, y);
        }
        z
    }

    /// Load a depth map from its on-disk text representation (spec.md §6).
    pub fn load_depth_map(&mut self, contents: &str) -> Result<()> {
        let lines: Vec<&str> = contents.lines().collect();
        let loaded = DepthMap::from_lines(
            self.depth_map.n(),
            self.depth_map.probe_radius(),
            self.depth_map.scale(),
            &lines,
        )
        .map_err(CalibrationError::IoFailed)?;
        self.depth_map = loaded;
        Ok(())
    }

    /// Render the depth map to its on-disk text representation.
    pub fn save_depth_map(&self) -> String {
        let mut out = String::from("; deltacal depth map\n");
        for line in self.depth_map.to_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
