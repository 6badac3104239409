//! The fixed N x N probe grid (spec.md §4.1).
//!
//! The grid doubles as the substrate for the depth map (bilinear lookup via
//! a precomputed cartesian-to-array scale factor) and as the annealer's
//! sample set of active points.

use std::f64::consts::FRAC_PI_6;

use crate::error::{CalibrationError, Result};
use crate::geometry::point::Point2D;

/// Classification of a single grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Classification {
    /// The single reference point, closest to the origin.
    Center,
    /// Inside the configured probe radius.
    Active,
    /// Outside the probe radius but horizontally adjacent to an active
    /// point; used to extend coverage to the edge via extrapolation.
    ActiveNeighbor,
    /// Neither active nor a usable neighbor.
    Inactive,
}

/// A single candidate probe point in the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPoint {
    pub coord: Point2D,
    pub classification: Classification,
}

/// Shape of the active region within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Circle,
    Square,
}

/// One of the three delta towers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tower {
    X,
    Y,
    Z,
}

/// The fixed, immutable-after-configuration N x N probe grid.
#[derive(Debug, Clone)]
pub struct Grid {
    probe_radius: f64,
    n: usize,
    shape: Shape,
    points: Vec<GridPoint>,
    /// Cartesian -> array scale factor: (N-1) / (2 * probe_radius).
    scale: f64,
    center_index: usize,
}

impl Grid {
    /// Build the grid. `n` must be odd (design permits 5 or 7).
    pub fn build(probe_radius: f64, n: usize, shape: Shape) -> Result<Self> {
        if n < 3 || n % 2 == 0 {
            return Err(CalibrationError::ConfigInvalid(format!(
                "grid resolution N={n} must be an odd integer >= 3"
            )));
        }
        if probe_radius <= 0.0 {
            return Err(CalibrationError::ConfigInvalid(
                "probe_radius must be positive".to_string(),
            ));
        }

        let step = 2.0 * probe_radius / (n - 1) as f64;
        let half = (n - 1) / 2;
        let neighbor_radius = probe_radius * (1.0 + 1.0 / (half as f64));

        let mut points = Vec::with_capacity(n * n);
        for iy in 0..n {
            let y = probe_radius - iy as f64 * step;
            for ix in 0..n {
                let x = -probe_radius + ix as f64 * step;
                let coord = Point2D::new(x, y);

                let classification = match shape {
                    Shape::Square => Classification::Active,
                    Shape::Circle => {
                        let dist = coord.radius();
                        if dist <= probe_radius {
                            Classification::Active
                        } else if dist <= neighbor_radius
                            && iy != 0
                            && iy != n - 1
                            && ix != half
                        {
                            Classification::ActiveNeighbor
                        } else {
                            Classification::Inactive
                        }
                    }
                };

                points.push(GridPoint { coord, classification });
            }
        }

        let center_index = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.coord
                    .distance_sq(Point2D::default())
                    .partial_cmp(&b.coord.distance_sq(Point2D::default()))
                    .unwrap()
            })
            .map(|(i, _)| i)
            .expect("grid always has at least one point");
        points[center_index].classification = Classification::Center;

        Ok(Self {
            probe_radius,
            n,
            shape,
            points,
            scale: (n - 1) as f64 / (2.0 * probe_radius),
            center_index,
        })
    }

    pub fn probe_radius(&self) -> f64 {
        self.probe_radius
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Cartesian -> array scale factor: (N-1) / (2 * probe_radius).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn center_index(&self) -> usize {
        self.center_index
    }

    pub fn point(&self, index: usize) -> GridPoint {
        self.points[index]
    }

    pub fn classification(&self, index: usize) -> Classification {
        self.points[index].classification
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points.iter().enumerate().filter_map(|(i, p)| {
            matches!(p.classification, Classification::Active | Classification::Center).then_some(i)
        })
    }

    pub fn active_neighbor_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| matches!(p.classification, Classification::ActiveNeighbor).then_some(i))
    }

    /// Row and column of grid index `i`.
    #[inline]
    pub fn row_col(&self, i: usize) -> (usize, usize) {
        (i / self.n, i % self.n)
    }

    /// The canonical tower-near grid index, nearest to:
    /// X = (-cos30 * r, -sin30 * r), Y = (cos30 * r, -sin30 * r), Z = (0, r).
    pub fn tower_point(&self, tower: Tower) -> usize {
        let r = self.probe_radius;
        let target = match tower {
            Tower::X => Point2D::new(-FRAC_PI_6.cos() * r, -FRAC_PI_6.sin() * r),
            Tower::Y => Point2D::new(FRAC_PI_6.cos() * r, -FRAC_PI_6.sin() * r),
            Tower::Z => Point2D::new(0.0, r),
        };
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.coord
                    .distance_sq(target)
                    .partial_cmp(&b.coord.distance_sq(target))
                    .unwrap()
            })
            .map(|(i, _)| i)
            .expect("grid always has at least one point")
    }

    /// Nearest grid index among ACTIVE or CENTER points to `p`.
    pub fn nearest_index(&self, p: Point2D) -> usize {
        self.active_indices()
            .min_by(|&a, &b| {
                self.points[a]
                    .coord
                    .distance_sq(p)
                    .partial_cmp(&self.points[b].coord.distance_sq(p))
                    .unwrap()
            })
            .expect("grid always has at least one active point")
    }
}
