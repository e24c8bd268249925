//! Search-graph vertices and the shared cost metric.

use skyway_geometry::Point3;

/// Weight applied to altitude differences before squaring.
///
/// Used identically by the step cost and the heuristic, which keeps the
/// heuristic consistent on the grid.
pub const ALTITUDE_WEIGHT: f64 = 0.5;

/// Euclidean distance with the altitude delta scaled by [`ALTITUDE_WEIGHT`].
pub fn weighted_distance(a: &Point3, b: &Point3) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = (b.z - a.z) * ALTITUDE_WEIGHT;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Quantized identity of a grid vertex: each coordinate rounded to the
/// nearest integer.  Nodes closer than that collapse into one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridKey {
    pub x: i64,
    pub y: i64,
    pub altitude: i64,
}

impl GridKey {
    pub fn quantize(x: f64, y: f64, altitude: f64) -> Self {
        Self {
            x: x.round() as i64,
            y: y.round() as i64,
            altitude: altitude.round() as i64,
        }
    }
}

/// One vertex of an A* search.
///
/// `parent` indexes the node arena of the search that created it; nodes are
/// never shared between searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridNode {
    pub x: f64,
    pub y: f64,
    pub altitude: f64,
    /// Cost of the best known path from the start.
    pub g_cost: f64,
    /// Heuristic estimate of the remaining cost to the goal.
    pub h_cost: f64,
    pub parent: Option<usize>,
}

impl GridNode {
    pub fn new(position: Point3, g_cost: f64, h_cost: f64, parent: Option<usize>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            altitude: position.z,
            g_cost,
            h_cost,
            parent,
        }
    }

    pub fn f_cost(&self) -> f64 {
        self.g_cost + self.h_cost
    }

    pub fn key(&self) -> GridKey {
        GridKey::quantize(self.x, self.y, self.altitude)
    }

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.altitude)
    }
}
