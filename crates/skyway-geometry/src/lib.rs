//! `skyway-geometry` – static obstacle geometry.
//!
//! Answers the questions the route planner and the flight controller ask
//! about the city's buildings: "does this point hit a building?", "can I fly
//! straight from here to there?", "how high must I be over this spot?".
//!
//! # Modules
//!
//! - [`aabb`] – [`Point3`][aabb::Point3] and [`Aabb`][aabb::Aabb], the
//!   primitive shapes every query is phrased in.
//! - [`spatial`] – [`SpatialGrid`][spatial::SpatialGrid]: uniform bucket grid
//!   used as the broad phase before exact footprint tests.
//! - [`city`] – [`CityModel`][city::CityModel]: the read-only city interface
//!   supplied by the map layer, plus the in-memory
//!   [`StaticCity`][city::StaticCity].
//! - [`detector`] – [`CollisionDetector`][detector::CollisionDetector]:
//!   point/segment clearance, minimum safe altitude, and nearby-building
//!   queries with a configurable collision radius.

pub mod aabb;
pub mod city;
pub mod detector;
pub mod spatial;

pub use aabb::{Aabb, Point3};
pub use city::{CityModel, StaticCity};
pub use detector::{CollisionDetector, DetectorConfig};
pub use spatial::SpatialGrid;
