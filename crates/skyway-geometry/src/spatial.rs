//! Broad-phase spatial index over building footprints.
//!
//! The city is cut into square cells of `cell_size` world units.  Each
//! obstacle's box is registered in every cell its footprint touches, so a
//! point or window query only has to look at the handful of obstacles that
//! share its cells before the exact test runs.
//!
//! # Example
//!
//! ```rust
//! use skyway_geometry::aabb::{Aabb, Point3};
//! use skyway_geometry::spatial::SpatialGrid;
//!
//! let mut grid = SpatialGrid::new(100.0);
//! grid.insert(0, &Aabb::new(Point3::new(10.0, 10.0, 0.0), Point3::new(40.0, 40.0, 90.0)));
//! grid.insert(1, &Aabb::new(Point3::new(510.0, 10.0, 0.0), Point3::new(540.0, 40.0, 90.0)));
//!
//! assert_eq!(grid.query_point(20.0, 20.0), vec![0]);
//! assert!(grid.query_point(300.0, 300.0).is_empty());
//! ```

use std::collections::HashMap;

use crate::aabb::Aabb;

/// Cell size used when none is configured.
pub const DEFAULT_CELL_SIZE: f64 = 100.0;

/// Boxes covering more cells than this are kept in a side list and tested
/// directly instead of being stamped into every cell.
pub const MAX_CELLS_PER_BOX: u128 = 4096;

/// Uniform bucket grid mapping cells to obstacle indices.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    oversized: Vec<(usize, Aabb)>,
    len: usize,
}

impl SpatialGrid {
    /// Create an empty grid.  Non-positive or non-finite sizes fall back to
    /// [`DEFAULT_CELL_SIZE`].
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            oversized: Vec::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of obstacles registered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register obstacle `index` in every cell covered by `bounds`.
    ///
    /// Boxes with non-finite horizontal extents are ignored.  Boxes wider
    /// than [`MAX_CELLS_PER_BOX`] cells go to the oversized list.
    pub fn insert(&mut self, index: usize, bounds: &Aabb) {
        let Some(range) = self.cell_range(bounds) else {
            return;
        };
        self.len += 1;
        if cell_count(range) > MAX_CELLS_PER_BOX {
            self.oversized.push((index, *bounds));
            return;
        }
        let (x0, y0, x1, y1) = range;
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(index);
            }
        }
    }

    /// Candidate obstacles whose cells contain `(x, y)`, sorted ascending.
    pub fn query_point(&self, x: f64, y: f64) -> Vec<usize> {
        let (Some(cx), Some(cy)) = (self.cell_coord(x), self.cell_coord(y)) else {
            return Vec::new();
        };
        let mut out = self.cells.get(&(cx, cy)).cloned().unwrap_or_default();
        if !self.oversized.is_empty() {
            out.extend(
                self.oversized
                    .iter()
                    .filter(|(_, b)| {
                        x >= b.min.x && x <= b.max.x && y >= b.min.y && y <= b.max.y
                    })
                    .map(|(i, _)| *i),
            );
            out.sort_unstable();
            out.dedup();
        }
        out
    }

    /// Candidate obstacles whose cells overlap the footprint of `window`,
    /// sorted ascending and without duplicates.
    ///
    /// Cost is bounded by the number of occupied cells, however large the
    /// window is.
    pub fn query_rect(&self, window: &Aabb) -> Vec<usize> {
        let Some(range) = self.cell_range(window) else {
            return Vec::new();
        };
        let (x0, y0, x1, y1) = range;
        let mut out = Vec::new();
        if cell_count(range) > self.cells.len() as u128 {
            for (&(cx, cy), bucket) in &self.cells {
                if (x0..=x1).contains(&cx) && (y0..=y1).contains(&cy) {
                    out.extend_from_slice(bucket);
                }
            }
        } else {
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    if let Some(bucket) = self.cells.get(&(cx, cy)) {
                        out.extend_from_slice(bucket);
                    }
                }
            }
        }
        out.extend(
            self.oversized
                .iter()
                .filter(|(_, b)| footprints_overlap(b, window))
                .map(|(i, _)| *i),
        );
        out.sort_unstable();
        out.dedup();
        out
    }

    fn cell_coord(&self, v: f64) -> Option<i64> {
        if v.is_finite() {
            Some((v / self.cell_size).floor() as i64)
        } else {
            None
        }
    }

    fn cell_range(&self, bounds: &Aabb) -> Option<(i64, i64, i64, i64)> {
        Some((
            self.cell_coord(bounds.min.x)?,
            self.cell_coord(bounds.min.y)?,
            self.cell_coord(bounds.max.x)?,
            self.cell_coord(bounds.max.y)?,
        ))
    }
}

/// Number of cells in an inclusive range, saturating instead of overflowing.
fn cell_count((x0, y0, x1, y1): (i64, i64, i64, i64)) -> u128 {
    let w = (i128::from(x1) - i128::from(x0) + 1).max(0) as u128;
    let h = (i128::from(y1) - i128::from(y0) + 1).max(0) as u128;
    w.saturating_mul(h)
}

fn footprints_overlap(a: &Aabb, b: &Aabb) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x && a.min.y <= b.max.y && a.max.y >= b.min.y
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aabb::Point3;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Aabb {
        Aabb::new(Point3::new(x0, y0, 0.0), Point3::new(x1, y1, 10.0))
    }

    #[test]
    fn empty_grid_returns_nothing() {
        let grid = SpatialGrid::default();
        assert!(grid.is_empty());
        assert!(grid.query_point(0.0, 0.0).is_empty());
        assert!(grid.query_rect(&rect(-500.0, -500.0, 500.0, 500.0)).is_empty());
    }

    #[test]
    fn box_spanning_cells_is_found_from_each_cell() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(3, &rect(50.0, 50.0, 250.0, 150.0));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.query_point(60.0, 60.0), vec![3]);
        assert_eq!(grid.query_point(240.0, 140.0), vec![3]);
        assert!(grid.query_point(240.0, 240.0).is_empty());
    }

    #[test]
    fn negative_coordinates_use_floor_cells() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(0, &rect(-150.0, -150.0, -110.0, -110.0));
        assert_eq!(grid.query_point(-120.0, -120.0), vec![0]);
        assert!(grid.query_point(-20.0, -20.0).is_empty());
    }

    #[test]
    fn rect_query_deduplicates() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(0, &rect(0.0, 0.0, 95.0, 95.0));
        grid.insert(1, &rect(200.0, 200.0, 210.0, 210.0));
        assert_eq!(grid.query_rect(&rect(0.0, 0.0, 100.0, 100.0)), vec![0]);
        assert_eq!(grid.query_rect(&rect(0.0, 0.0, 300.0, 300.0)), vec![0, 1]);
    }

    #[test]
    fn nan_queries_are_empty() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(0, &rect(0.0, 0.0, 5.0, 5.0));
        assert!(grid.query_point(f64::NAN, 1.0).is_empty());
    }

    #[test]
    fn huge_window_scans_occupied_cells_only() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(0, &rect(10.0, 10.0, 60.0, 60.0));
        grid.insert(1, &rect(5_000.0, 5_000.0, 5_050.0, 5_050.0));
        let everything = rect(-1e15, -1e15, 1e15, 1e15);
        assert_eq!(grid.query_rect(&everything), vec![0, 1]);
        assert_eq!(grid.query_rect(&rect(-1e12, -1e12, 1_000.0, 1_000.0)), vec![0]);
    }

    #[test]
    fn oversized_box_is_not_stamped_into_cells() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(0, &rect(-1e9, -1e9, 1e9, 1e9));
        grid.insert(1, &rect(0.0, 0.0, 5.0, 5.0));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cells.len(), 1);
        assert_eq!(grid.query_point(1.0, 1.0), vec![0, 1]);
        assert_eq!(grid.query_point(5e8, -5e8), vec![0]);
        assert!(grid.query_point(2e9, 0.0).is_empty());
        assert_eq!(grid.query_rect(&rect(100.0, 100.0, 200.0, 200.0)), vec![0]);
        assert!(grid.query_rect(&rect(3e9, 3e9, 4e9, 4e9)).is_empty());
    }

    #[test]
    fn invalid_cell_size_falls_back_to_default() {
        assert_eq!(SpatialGrid::new(0.0).cell_size(), DEFAULT_CELL_SIZE);
        assert_eq!(SpatialGrid::new(f64::NAN).cell_size(), DEFAULT_CELL_SIZE);
    }
}
