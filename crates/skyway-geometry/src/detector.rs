//! [`CollisionDetector`] – point and segment clearance against buildings.
//!
//! Every query first narrows the building set through the [`SpatialGrid`]
//! broad phase and then runs the exact footprint test.  Buildings are solid
//! from the ground up to their roof; horizontally they are grown by the
//! agent's collision radius so that a point query stands in for the whole
//! jetpack.
//!
//! None of the queries fail: NaN or off-map coordinates simply report "no
//! collision" / "no building".
//!
//! # Known limitation
//!
//! [`CollisionDetector::is_path_clear`] samples the segment every
//! `sample_step` units.  An obstacle narrower than the step (after
//! inflation) can fall between two samples and go unnoticed.
//!
//! # Example
//!
//! ```rust
//! use skyway_geometry::detector::CollisionDetector;
//! use skyway_types::BuildingVolume;
//!
//! let detector = CollisionDetector::new(vec![
//!     BuildingVolume::new(100.0, 100.0, 50.0, 50.0, 120.0),
//! ]);
//!
//! assert!(detector.check_collision(125.0, 125.0, 100.0));
//! assert!(!detector.check_collision(125.0, 125.0, 130.0));
//! assert_eq!(detector.minimum_safe_altitude(125.0, 125.0), 120.0);
//! assert!(!detector.is_path_clear(0.0, 125.0, 100.0, 300.0, 125.0, 100.0));
//! ```

use skyway_types::BuildingVolume;
use tracing::debug;

use crate::aabb::{Aabb, Point3};
use crate::city::CityModel;
use crate::spatial::{DEFAULT_CELL_SIZE, SpatialGrid};

/// Default horizontal clearance kept around every building.
pub const DEFAULT_COLLISION_RADIUS: f64 = 5.0;

/// Default spacing between samples along a tested segment.
pub const DEFAULT_SAMPLE_STEP: f64 = 5.0;

/// Default vertical margin that [`CollisionDetector::is_safe_position`]
/// demands above the tallest roof underneath.
pub const DEFAULT_SAFETY_MARGIN: f64 = 10.0;

/// Tunables for [`CollisionDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Horizontal inflation applied to every footprint.
    pub collision_radius: f64,
    /// Distance between samples in [`CollisionDetector::is_path_clear`].
    pub sample_step: f64,
    /// Minimum height above the roof for a position to count as safe.
    pub safety_margin: f64,
    /// Cell size of the broad-phase grid.
    pub cell_size: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            collision_radius: DEFAULT_COLLISION_RADIUS,
            sample_step: DEFAULT_SAMPLE_STEP,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Geometric collision tester over an immutable building set.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    buildings: Vec<BuildingVolume>,
    index: SpatialGrid,
    config: DetectorConfig,
}

impl CollisionDetector {
    /// Build a detector with the default [`DetectorConfig`].
    pub fn new(buildings: Vec<BuildingVolume>) -> Self {
        Self::with_config(buildings, DetectorConfig::default())
    }

    /// Build a detector with an explicit configuration.
    ///
    /// A non-positive `sample_step` is replaced by the default step; a
    /// negative `collision_radius` is treated as zero.
    pub fn with_config(buildings: Vec<BuildingVolume>, mut config: DetectorConfig) -> Self {
        if !(config.sample_step.is_finite() && config.sample_step > 0.0) {
            config.sample_step = DEFAULT_SAMPLE_STEP;
        }
        config.collision_radius = config.collision_radius.max(0.0);

        let mut index = SpatialGrid::new(config.cell_size);
        for (i, b) in buildings.iter().enumerate() {
            index.insert(i, &Aabb::from_building(b, config.collision_radius));
        }
        debug!(
            buildings = buildings.len(),
            collision_radius = config.collision_radius,
            "collision detector built"
        );
        Self {
            buildings,
            index,
            config,
        }
    }

    /// Build a detector over every building of `city`.
    pub fn from_city(city: &dyn CityModel, config: DetectorConfig) -> Self {
        Self::with_config(city.buildings().to_vec(), config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn buildings(&self) -> &[BuildingVolume] {
        &self.buildings
    }

    /// True when a jetpack at `(x, y, altitude)` would touch a building.
    pub fn check_collision(&self, x: f64, y: f64, altitude: f64) -> bool {
        if !altitude.is_finite() {
            return false;
        }
        let r = self.config.collision_radius;
        self.index
            .query_point(x, y)
            .into_iter()
            .map(|i| &self.buildings[i])
            .any(|b| altitude <= b.height && b.footprint_contains(x, y, r))
    }

    /// True when no sample along the straight segment collides.
    pub fn is_path_clear(
        &self,
        x1: f64,
        y1: f64,
        alt1: f64,
        x2: f64,
        y2: f64,
        alt2: f64,
    ) -> bool {
        let a = Point3::new(x1, y1, alt1);
        let b = Point3::new(x2, y2, alt2);

        // Nothing near the segment's bounding box: skip the sampling.
        let sweep = Aabb::new(a, b);
        if self.index.query_rect(&sweep).is_empty() {
            return true;
        }

        let length = a.distance(&b);
        let steps = if length.is_finite() {
            ((length / self.config.sample_step).ceil() as usize).max(1)
        } else {
            1
        };
        (0..=steps).all(|i| {
            let p = a.lerp(&b, i as f64 / steps as f64);
            !self.check_collision(p.x, p.y, p.z)
        })
    }

    /// Roof height of the tallest building directly under `(x, y)`, or
    /// `0.0` over open ground.  Callers add their own margin.
    pub fn minimum_safe_altitude(&self, x: f64, y: f64) -> f64 {
        self.index
            .query_point(x, y)
            .into_iter()
            .map(|i| &self.buildings[i])
            .filter(|b| b.footprint_contains(x, y, 0.0))
            .map(|b| b.height)
            .fold(0.0, f64::max)
    }

    /// Buildings whose footprint lies within `radius` of `(x, y)`, in the
    /// order they were supplied.
    pub fn nearby_buildings(&self, x: f64, y: f64, radius: f64) -> Vec<&BuildingVolume> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        self.index
            .query_rect(&Aabb::around(x, y, radius))
            .into_iter()
            .map(|i| &self.buildings[i])
            .filter(|b| Aabb::from_building(b, 0.0).horizontal_distance(x, y) <= radius)
            .collect()
    }

    /// True when the position is collision-free *and* at least
    /// `safety_margin` above the tallest roof underneath.
    pub fn is_safe_position(&self, x: f64, y: f64, altitude: f64) -> bool {
        !self.check_collision(x, y, altitude)
            && altitude - self.minimum_safe_altitude(x, y) >= self.config.safety_margin
    }
}
