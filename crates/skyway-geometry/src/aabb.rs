//! Points and axis-aligned boxes.
//!
//! Building volumes are boxes that stand on the ground plane, so every
//! query in this crate is phrased in terms of [`Aabb`]s: a footprint grown
//! by the agent's collision radius, a broad-phase search window, a sampled
//! path segment's bounding box.

use skyway_types::BuildingVolume;

// ────────────────────────────────────────────────────────────────────────────
// Point3
// ────────────────────────────────────────────────────────────────────────────

/// A point in world space.  `z` is altitude above ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Create a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`.
    pub fn lerp(&self, other: &Point3, t: f64) -> Point3 {
        Point3::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The constructor normalises the corners so that `min ≤ max` per axis.
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The solid occupied by `building`, with its footprint grown by
    /// `inflate` on every horizontal side.  The vertical extent is
    /// `[0, height]` and is never inflated.
    pub fn from_building(building: &BuildingVolume, inflate: f64) -> Self {
        Self::new(
            Point3::new(building.x - inflate, building.y - inflate, 0.0),
            Point3::new(
                building.x + building.width + inflate,
                building.y + building.length + inflate,
                building.height,
            ),
        )
    }

    /// A horizontal search window of half-size `radius` around `(x, y)`,
    /// spanning every altitude.
    pub fn around(x: f64, y: f64, radius: f64) -> Self {
        Self::new(
            Point3::new(x - radius, y - radius, f64::NEG_INFINITY),
            Point3::new(x + radius, y + radius, f64::INFINITY),
        )
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// True when `other` overlaps (intersects or touches) this box.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Horizontal distance from `(x, y)` to the box's footprint; zero when
    /// the point is over the footprint.
    pub fn horizontal_distance(&self, x: f64, y: f64) -> f64 {
        let dx = (self.min.x - x).max(0.0).max(x - self.max.x);
        let dy = (self.min.y - y).max(0.0).max(y - self.max.y);
        (dx * dx + dy * dy).sqrt()
    }
}
