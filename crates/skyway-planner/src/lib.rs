//! `skyway-planner` – building-aware 3D route planning.
//!
//! Routes a jetpack from one map position to another around the city's
//! buildings.  The search runs A* on a lattice anchored at the start, then
//! shortens the result by line-of-sight simplification.  The caller gets 2D
//! [`Waypoint`][skyway_types::Waypoint]s; altitude is left to the flight
//! controller.
//!
//! # Modules
//!
//! - [`node`] – [`GridKey`][node::GridKey], [`GridNode`][node::GridNode] and
//!   the weighted distance used as both step cost and heuristic.
//! - [`astar`] – [`BuildingAwarePathfinder`][astar::BuildingAwarePathfinder],
//!   its [`PathfinderConfig`][astar::PathfinderConfig] and the
//!   [`PlanError`][astar::PlanError] failure reasons.
//! - [`simplify`] – greedy farthest-visible path reduction.

pub mod astar;
pub mod node;
pub mod simplify;

pub use astar::{BuildingAwarePathfinder, PathfinderConfig, PlanError, Route};
pub use node::{ALTITUDE_WEIGHT, GridKey, GridNode, weighted_distance};
pub use simplify::simplify_path;
