//! The city model consumed by the navigation engine.

use serde::{Deserialize, Serialize};
use skyway_types::{BuildingVolume, MapBounds};

/// Read-only view of a city supplied by the map layer.
pub trait CityModel: Send + Sync {
    /// Every static obstacle in the city.
    fn buildings(&self) -> &[BuildingVolume];

    /// Navigable map rectangle.
    fn bounds(&self) -> MapBounds;

    /// True when `(x, y)` is over open water.  Cities without terrain data
    /// report dry land everywhere.
    fn is_water(&self, _x: f64, _y: f64) -> bool {
        false
    }
}

/// In-memory city, typically loaded from a TOML city file:
///
/// ```toml
/// [bounds]
/// min_x = 0.0
/// min_y = 0.0
/// max_x = 2000.0
/// max_y = 2000.0
///
/// [[buildings]]
/// x = 150.0
/// y = -100.0
/// width = 100.0
/// length = 200.0
/// height = 500.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCity {
    pub bounds: MapBounds,
    #[serde(default)]
    pub buildings: Vec<BuildingVolume>,
}

impl StaticCity {
    pub fn new(bounds: MapBounds, buildings: Vec<BuildingVolume>) -> Self {
        Self { bounds, buildings }
    }
}

impl CityModel for StaticCity {
    fn buildings(&self) -> &[BuildingVolume] {
        &self.buildings
    }

    fn bounds(&self) -> MapBounds {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_file_parses() {
        let raw = r#"
            [bounds]
            min_x = 0.0
            min_y = 0.0
            max_x = 2000.0
            max_y = 1000.0

            [[buildings]]
            x = 150.0
            y = -100.0
            width = 100.0
            length = 200.0
            height = 500.0
        "#;
        let city: StaticCity = toml::from_str(raw).expect("parse city");
        assert_eq!(city.buildings().len(), 1);
        assert_eq!(city.bounds().max_y, 1000.0);
        assert!(!city.is_water(10.0, 10.0));
    }

    #[test]
    fn buildings_section_is_optional() {
        let raw = r#"
            [bounds]
            min_x = 0.0
            min_y = 0.0
            max_x = 10.0
            max_y = 10.0
        "#;
        let city: StaticCity = toml::from_str(raw).expect("parse city");
        assert!(city.buildings().is_empty());
    }
}
