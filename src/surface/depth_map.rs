//! The N x N bilinearly-interpolated depth map (spec.md §4.3).
//!
//! A flat fixed-capacity buffer, allocated once and reused; entries for
//! `INACTIVE` grid points are zero by invariant.

/// Depth-map values outside this bound (mm) are rejected on load (spec.md §6/§7).
pub const DEPTH_MAP_BOUND_MM: f64 = crate::constants::DEPTH_MAP_BOUND_MM;

/// A flat, fixed-capacity N x N depth map with bilinear sampling.
#[derive(Debug, Clone)]
pub struct DepthMap {
    n: usize,
    probe_radius: f64,
    scale: f64,
    values: Vec<f64>,
}

impl DepthMap {
    /// Allocate a zeroed N x N depth map.
    pub fn new(n: usize, probe_radius: f64, scale: f64) -> Self {
        Self {
            n,
            probe_radius,
            scale,
            values: vec![0.0; n * n],
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn probe_radius(&self) -> f64 {
        self.probe_radius
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn set(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    pub fn get_raw(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Replace the whole buffer. Length must equal `n * n`.
    pub fn set_all(&mut self, values: Vec<f64>) -> Result<(), String> {
        if values.len() != self.n * self.n {
            return Err(format!(
                "depth map expects {} entries, got {}",
                self.n * self.n,
                values.len()
            ));
        }
        self.values = values;
        Ok(())
    }

    /// Bilinear interpolation at (x, y), clamped to ±probe_radius.
    ///
    /// array coords: ax = (x+probe_radius)*scale, ay = (-y+probe_radius)*scale;
    /// x1 = floor(ax), y1 = floor(ay), x2 = x1+1, y2 = y1+1.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let pr = self.probe_radius;
        let cx = x.clamp(-pr, pr);
        let cy = y.clamp(-pr, pr);

        let n = self.n;
        let max_coord = (n - 1) as f64;

        let ax = ((cx + pr) * self.scale).clamp(0.0, max_coord);
        let ay = ((-cy + pr) * self.scale).clamp(0.0, max_coord);

        let x1 = (ax.floor() as usize).min(n.saturating_sub(2));
        let y1 = (ay.floor() as usize).min(n.saturating_sub(2));
        let x2 = x1 + 1;
        let y2 = y1 + 1;

        let q11 = self.values[y1 * n + x1];
        let q21 = self.values[y1 * n + x2];
        let q12 = self.values[y2 * n + x1];
        let q22 = self.values[y2 * n + x2];

        let fx2 = x2 as f64 - ax;
        let fx1 = ax - x1 as f64;
        let fy2 = y2 as f64 - ay;
        let fy1 = ay - y1 as f64;

        q11 * fx2 * fy2 + q21 * fx1 * fy2 + q12 * fx2 * fy1 + q22 * fx1 * fy1
    }

    /// Serialize as the `/sd/dm_surface_transform` text format: one float
    /// per line, row-major, no header. Comments are written by the caller
    /// (the save-stream collaborator), not by this method.
    pub fn to_lines(&self) -> Vec<String> {
        self.values.iter().map(|v| format!("{:.5}", v)).collect()
    }

    /// Parse the `/sd/dm_surface_transform` text format: `;`-prefixed
    /// comment lines are ignored, one float per remaining line, row-major.
    /// Values outside ±[`DEPTH_MAP_BOUND_MM`] are rejected.
    pub fn from_lines(n: usize, probe_radius: f64, scale: f64, lines: &[&str]) -> Result<Self, String> {
        let mut values = Vec::with_capacity(n * n);
        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            let value: f64 = trimmed
                .parse()
                .map_err(|_| format!("invalid depth map value: {trimmed:?}"))?;
            if !(-DEPTH_MAP_BOUND_MM..=DEPTH_MAP_BOUND_MM).contains(&value) {
                return Err(format!(
                    "depth map value {value} outside allowed range of ±{DEPTH_MAP_BOUND_MM} mm"
                ));
            }
            values.push(value);
        }
        if values.len() != n * n {
            return Err(format!(
                "depth map expects {} entries, parsed {}",
                n * n,
                values.len()
            ));
        }
        Ok(Self { n, probe_radius, scale, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_map(n: usize, probe_radius: f64) -> DepthMap {
        let scale = (n - 1) as f64 / (2.0 * probe_radius);
        let mut dm = DepthMap::new(n, probe_radius, scale);
        let step = 2.0 * probe_radius / (n - 1) as f64;
        for iy in 0..n {
            let y = probe_radius - iy as f64 * step;
            for ix in 0..n {
                let x = -probe_radius + ix as f64 * step;
                let _ = y;
                dm.set(iy * n + ix, x * 0.01);
            }
        }
        dm
    }

    #[test]
    fn bilinear_matches_linear_function() {
        let dm = linear_map(5, 100.0);
        assert!((dm.sample(50.0, 0.0) - 0.5).abs() < 1e-4);
        assert!((dm.sample(0.0, 50.0) - 0.0).abs() < 1e-4);
    }

    #[test]
    fn corners_return_exact_stored_values() {
        let n = 5;
        let pr = 100.0;
        let scale = (n - 1) as f64 / (2.0 * pr);
        let mut dm = DepthMap::new(n, pr, scale);
        for i in 0..n * n {
            dm.set(i, i as f64 * 0.01);
        }
        // top-left corner: x=-pr, y=+pr -> index 0
        assert_eq!(dm.sample(-pr, pr), dm.get_raw(0));
        // top-right corner: x=+pr, y=+pr -> index n-1
        assert_eq!(dm.sample(pr, pr), dm.get_raw(n - 1));
        // bottom-left: x=-pr, y=-pr -> index (n-1)*n
        assert_eq!(dm.sample(-pr, -pr), dm.get_raw((n - 1) * n));
        // bottom-right
        assert_eq!(dm.sample(pr, -pr), dm.get_raw(n * n - 1));
    }

    #[test]
    fn out_of_radius_samples_equal_clamped_samples() {
        let dm = linear_map(5, 100.0);
        let far = dm.sample(500.0, 500.0);
        let clamped = dm.sample(100.0, 100.0);
        assert_eq!(far, clamped);
    }

    #[test]
    fn round_trip_through_text_format_is_exact_to_file_precision() {
        let n = 5;
        let pr = 100.0;
        let scale = (n - 1) as f64 / (2.0 * pr);
        let mut dm = DepthMap::new(n, pr, scale);
        for i in 0..n * n {
            dm.set(i, (i + 1) as f64 * 0.01);
        }
        let lines = dm.to_lines();
        let mut rendered: Vec<String> = vec!["; depth map".to_string()];
        rendered.extend(lines);
        let refs: Vec<&str> = rendered.iter().map(|s| s.as_str()).collect();
        let reloaded = DepthMap::from_lines(n, pr, scale, &refs).unwrap();

        for i in 0..n * n {
            assert!((dm.get_raw(i) - reloaded.get_raw(i)).abs() < 1e-5);
        }
    }

    #[test]
    fn out_of_bound_value_is_rejected() {
        let lines = vec!["6.0"];
        let result = DepthMap::from_lines(1, 10.0, 1.0, &lines);
        assert!(result.is_err());
    }
}
