//! [`BuildingAwarePathfinder`] – 3D A* over a regular flight lattice.
//!
//! The lattice is anchored at the start position: every vertex is reached by
//! one of ten moves (eight horizontal compass steps, straight up, straight
//! down) of [`PathfinderConfig::horizontal_step`] /
//! [`PathfinderConfig::altitude_step`] units.  A candidate vertex is dropped
//! when it leaves the altitude band or the map, when the jetpack would touch
//! a building there, or when the straight hop from its parent is blocked.
//!
//! | Stage          | Detail                                                |
//! |----------------|-------------------------------------------------------|
//! | Endpoints      | `max(cruise_floor, roof + clearance_margin)`          |
//! | Open set       | binary min-heap on f-cost, FIFO among equal f         |
//! | Closed set     | `HashSet<GridKey>`                                    |
//! | Relaxation     | only on a strictly lower g-cost                       |
//! | Goal test      | `|dx| < step`, `|dy| < step`, `|dalt| < 5`            |
//! | Limits         | expansion budget, optional wall-clock deadline        |
//! | Post-process   | greedy line-of-sight simplification                   |
//!
//! # Example
//!
//! ```rust
//! use skyway_planner::BuildingAwarePathfinder;
//! use skyway_types::{BuildingVolume, MapBounds};
//!
//! let planner = BuildingAwarePathfinder::new(
//!     vec![BuildingVolume::new(150.0, -100.0, 100.0, 200.0, 500.0)],
//!     MapBounds::new(-1000.0, -1000.0, 2000.0, 2000.0),
//! );
//! let route = planner.find_path(0.0, 0.0, 400.0, 0.0);
//! assert!(route.len() >= 3);
//! assert!(route.iter().any(|w| w.y.abs() > 100.0));
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use skyway_geometry::{CityModel, CollisionDetector, DetectorConfig, Point3};
use skyway_types::{BuildingVolume, MapBounds, Waypoint};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::node::{GridKey, GridNode, weighted_distance};
use crate::simplify::simplify_path;

/// Search tunables.  The defaults describe a jetpack cruising between 50
/// and 300 units above ground.
#[derive(Debug, Clone, PartialEq)]
pub struct PathfinderConfig {
    /// Length of one horizontal lattice move along each axis.
    pub horizontal_step: f64,
    /// Height of one vertical lattice move.
    pub altitude_step: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// Lowest altitude assigned to a route endpoint.
    pub cruise_floor: f64,
    /// Height kept above the roof under a route endpoint.
    pub clearance_margin: f64,
    /// Node expansions allowed before the search gives up.
    pub max_expansions: usize,
    /// Altitude difference tolerated when testing for the goal.
    pub goal_tolerance_altitude: f64,
    /// Horizontal goal tolerance in multiples of `horizontal_step`.
    pub goal_tolerance_steps: f64,
    /// Wall-clock limit for one search; `None` means expansions only.
    pub deadline: Option<Duration>,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            horizontal_step: 20.0,
            altitude_step: 30.0,
            min_altitude: 50.0,
            max_altitude: 300.0,
            cruise_floor: 100.0,
            clearance_margin: 20.0,
            max_expansions: 5_000,
            goal_tolerance_altitude: 5.0,
            goal_tolerance_steps: 1.0,
            deadline: None,
        }
    }
}

/// Why a search ended without reaching the goal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("no route exists: open set exhausted after {expansions} expansions")]
    Unreachable { expansions: usize },

    #[error("expansion budget exhausted after {expansions} expansions")]
    BudgetExhausted { expansions: usize },

    #[error("deadline exceeded after {expansions} expansions ({elapsed:?})")]
    DeadlineExceeded { expansions: usize, elapsed: Duration },
}

impl PlanError {
    /// Nodes expanded before the search stopped.
    pub fn expansions(&self) -> usize {
        match self {
            PlanError::Unreachable { expansions }
            | PlanError::BudgetExhausted { expansions }
            | PlanError::DeadlineExceeded { expansions, .. } => *expansions,
        }
    }
}

/// A successful plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Simplified 2D route, starting at the requested start.
    pub waypoints: Vec<Waypoint>,
    /// Altitude assigned to the start endpoint.
    pub cruise_altitude: f64,
    pub expansions: usize,
    /// Lattice nodes on the path before simplification.
    pub raw_nodes: usize,
}

/// Min-heap entry: lower f first, then earlier insertion.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    f: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The ten lattice moves as unit offsets `(dx, dy, dalt)`.
const MOVES: [(f64, f64, f64); 10] = [
    (1.0, 0.0, 0.0),
    (1.0, 1.0, 0.0),
    (0.0, 1.0, 0.0),
    (-1.0, 1.0, 0.0),
    (-1.0, 0.0, 0.0),
    (-1.0, -1.0, 0.0),
    (0.0, -1.0, 0.0),
    (1.0, -1.0, 0.0),
    (0.0, 0.0, 1.0),
    (0.0, 0.0, -1.0),
];

/// Route planner over an immutable building set.
///
/// Holds no per-search state, so one instance can be shared behind an
/// [`Arc`] and queried from several threads.
#[derive(Debug, Clone)]
pub struct BuildingAwarePathfinder {
    detector: Arc<CollisionDetector>,
    bounds: MapBounds,
    config: PathfinderConfig,
}

impl BuildingAwarePathfinder {
    pub fn new(buildings: Vec<BuildingVolume>, bounds: MapBounds) -> Self {
        Self::with_config(
            Arc::new(CollisionDetector::new(buildings)),
            bounds,
            PathfinderConfig::default(),
        )
    }

    pub fn with_config(
        detector: Arc<CollisionDetector>,
        bounds: MapBounds,
        config: PathfinderConfig,
    ) -> Self {
        Self {
            detector,
            bounds,
            config,
        }
    }

    /// Build a planner for `city` with the given detector and search settings.
    pub fn from_city(
        city: &dyn CityModel,
        detector_config: DetectorConfig,
        config: PathfinderConfig,
    ) -> Self {
        Self::with_config(
            Arc::new(CollisionDetector::from_city(city, detector_config)),
            city.bounds(),
            config,
        )
    }

    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    pub fn bounds(&self) -> MapBounds {
        self.bounds
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    /// Altitude assigned to a route endpoint at `(x, y)`.
    pub fn endpoint_altitude(&self, x: f64, y: f64) -> f64 {
        let roof = self.detector.minimum_safe_altitude(x, y);
        self.config
            .cruise_floor
            .max(roof + self.config.clearance_margin)
    }

    /// Plan a route and return its waypoints, or an empty list when no
    /// route was found for any reason.
    pub fn find_path(&self, start_x: f64, start_y: f64, dest_x: f64, dest_y: f64) -> Vec<Waypoint> {
        match self.plan(start_x, start_y, dest_x, dest_y) {
            Ok(route) => route.waypoints,
            Err(_) => Vec::new(),
        }
    }

    /// Plan a route, reporting why the search failed when it does.
    #[instrument(skip(self))]
    pub fn plan(
        &self,
        start_x: f64,
        start_y: f64,
        dest_x: f64,
        dest_y: f64,
    ) -> Result<Route, PlanError> {
        let start_alt = self.endpoint_altitude(start_x, start_y);
        let goal_alt = self.lattice_altitude(start_alt, self.endpoint_altitude(dest_x, dest_y));
        let start = Point3::new(start_x, start_y, start_alt);
        let goal = Point3::new(dest_x, dest_y, goal_alt);

        let (raw, expansions) = match self.search(start, goal) {
            Ok(found) => found,
            Err(e) => {
                info!(error = %e, "no route found");
                return Err(e);
            }
        };

        let simplified = simplify_path(&self.detector, &raw);
        debug!(
            expansions,
            raw_nodes = raw.len(),
            waypoints = simplified.len(),
            "route found"
        );
        Ok(Route {
            waypoints: simplified.iter().map(|p| Waypoint::new(p.x, p.y)).collect(),
            cruise_altitude: start_alt,
            expansions,
            raw_nodes: raw.len(),
        })
    }

    /// Raise `target` to the next level of the altitude lattice through
    /// `base`.
    fn lattice_altitude(&self, base: f64, target: f64) -> f64 {
        let step = self.config.altitude_step;
        if !(step > 0.0) {
            return target;
        }
        base + ((target - base) / step).ceil() * step
    }

    fn reaches_goal(&self, node: &GridNode, goal: &Point3) -> bool {
        let tolerance = self.config.horizontal_step * self.config.goal_tolerance_steps;
        (node.x - goal.x).abs() < tolerance
            && (node.y - goal.y).abs() < tolerance
            && (node.altitude - goal.z).abs() < self.config.goal_tolerance_altitude
    }

    fn search(&self, start: Point3, goal: Point3) -> Result<(Vec<Point3>, usize), PlanError> {
        let started = Instant::now();
        let cfg = &self.config;

        let mut arena: Vec<GridNode> = Vec::new();
        let mut open = BinaryHeap::new();
        let mut best_g: HashMap<GridKey, f64> = HashMap::new();
        let mut closed: HashSet<GridKey> = HashSet::new();
        let mut seq: u64 = 0;
        let mut expansions = 0usize;

        let root = GridNode::new(start, 0.0, weighted_distance(&start, &goal), None);
        best_g.insert(root.key(), 0.0);
        arena.push(root);
        open.push(QueueEntry {
            f: root.f_cost(),
            seq,
            node: 0,
        });

        while let Some(QueueEntry { node: index, .. }) = open.pop() {
            let current = arena[index];
            let key = current.key();
            if closed.contains(&key) {
                // Superseded by a cheaper entry for the same vertex.
                continue;
            }

            if self.reaches_goal(&current, &goal) {
                return Ok((reconstruct(&arena, index), expansions));
            }
            if expansions >= cfg.max_expansions {
                return Err(PlanError::BudgetExhausted { expansions });
            }
            if let Some(limit) = cfg.deadline {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(PlanError::DeadlineExceeded {
                        expansions,
                        elapsed,
                    });
                }
            }

            closed.insert(key);
            expansions += 1;

            let here = current.position();
            for (ux, uy, uz) in MOVES {
                let next = Point3::new(
                    here.x + ux * cfg.horizontal_step,
                    here.y + uy * cfg.horizontal_step,
                    here.z + uz * cfg.altitude_step,
                );
                if next.z < cfg.min_altitude || next.z > cfg.max_altitude {
                    continue;
                }
                if !self.bounds.contains(next.x, next.y) {
                    continue;
                }
                let next_key = GridKey::quantize(next.x, next.y, next.z);
                if closed.contains(&next_key) {
                    continue;
                }
                if self.detector.check_collision(next.x, next.y, next.z) {
                    continue;
                }
                if !self
                    .detector
                    .is_path_clear(here.x, here.y, here.z, next.x, next.y, next.z)
                {
                    continue;
                }

                let g = current.g_cost + weighted_distance(&here, &next);
                if best_g.get(&next_key).is_some_and(|&known| g >= known) {
                    continue;
                }
                best_g.insert(next_key, g);

                let child = GridNode::new(next, g, weighted_distance(&next, &goal), Some(index));
                arena.push(child);
                seq += 1;
                open.push(QueueEntry {
                    f: child.f_cost(),
                    seq,
                    node: arena.len() - 1,
                });
            }
        }

        Err(PlanError::Unreachable { expansions })
    }
}

/// Walk parent links back from `last` and return the positions start-first.
fn reconstruct(arena: &[GridNode], last: usize) -> Vec<Point3> {
    let mut path = Vec::new();
    let mut cursor = Some(last);
    while let Some(i) = cursor {
        let node = &arena[i];
        path.push(node.position());
        cursor = node.parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyway_geometry::StaticCity;
    use skyway_types::BuildingVolume;

    fn wide_bounds() -> MapBounds {
        MapBounds::new(-1000.0, -1000.0, 2000.0, 2000.0)
    }

    fn wall_planner() -> BuildingAwarePathfinder {
        // Footprint x∈[150,250], y∈[-100,100], far above the altitude band.
        BuildingAwarePathfinder::new(
            vec![BuildingVolume::new(150.0, -100.0, 100.0, 200.0, 500.0)],
            wide_bounds(),
        )
    }

    // ── endpoints ───────────────────────────────────────────────────────────

    #[test]
    fn endpoint_altitude_respects_floor_and_roofs() {
        let planner = BuildingAwarePathfinder::new(
            vec![
                BuildingVolume::new(0.0, 0.0, 50.0, 50.0, 40.0),
                BuildingVolume::new(100.0, 0.0, 50.0, 50.0, 150.0),
            ],
            wide_bounds(),
        );
        assert_eq!(planner.endpoint_altitude(500.0, 500.0), 100.0);
        assert_eq!(planner.endpoint_altitude(25.0, 25.0), 100.0);
        assert_eq!(planner.endpoint_altitude(125.0, 25.0), 170.0);
    }

    #[test]
    fn goal_altitude_is_snapped_onto_the_start_lattice() {
        // Roof of 95 under the destination puts its endpoint at 115, which
        // lies between the 100 and 130 lattice levels.
        let planner = BuildingAwarePathfinder::new(
            vec![BuildingVolume::new(280.0, -20.0, 40.0, 40.0, 95.0)],
            wide_bounds(),
        );
        assert_eq!(planner.endpoint_altitude(300.0, 0.0), 115.0);
        assert_eq!(planner.lattice_altitude(100.0, 115.0), 130.0);
        assert_eq!(planner.lattice_altitude(100.0, 100.0), 100.0);
        assert_eq!(planner.lattice_altitude(160.0, 100.0), 100.0);

        let route = planner.plan(0.0, 0.0, 300.0, 0.0).expect("route over low roof");
        let last = route.waypoints.last().expect("non-empty");
        assert!((last.x - 300.0).abs() < 20.0);
        assert!(last.y.abs() < 20.0);
    }

    // ── search outcomes ─────────────────────────────────────────────────────

    #[test]
    fn open_sky_route_is_a_straight_line() {
        let planner = BuildingAwarePathfinder::new(Vec::new(), wide_bounds());
        let route = planner.plan(0.0, 0.0, 100.0, 100.0).expect("route");
        assert_eq!(
            route.waypoints,
            vec![Waypoint::new(0.0, 0.0), Waypoint::new(100.0, 100.0)]
        );
        assert_eq!(route.cruise_altitude, 100.0);
        assert_eq!(route.raw_nodes, 6);
    }

    #[test]
    fn start_at_destination_yields_single_waypoint() {
        let planner = BuildingAwarePathfinder::new(Vec::new(), wide_bounds());
        let route = planner.plan(40.0, 40.0, 45.0, 45.0).expect("route");
        assert_eq!(route.waypoints, vec![Waypoint::new(40.0, 40.0)]);
        assert_eq!(route.expansions, 0);
    }

    #[test]
    fn route_deviates_around_blocking_building() {
        let planner = wall_planner();
        let route = planner.plan(0.0, 0.0, 400.0, 0.0).expect("detour exists");
        let waypoints = &route.waypoints;

        assert_eq!(waypoints.first(), Some(&Waypoint::new(0.0, 0.0)));
        let last = waypoints.last().expect("non-empty");
        assert!((last.x - 400.0).abs() < 20.0 && last.y.abs() < 20.0);
        assert!(waypoints.len() >= 3, "straight line is blocked");
        assert!(waypoints.iter().any(|w| w.y.abs() > 100.0));
        for w in waypoints {
            assert!(
                !planner
                    .detector()
                    .check_collision(w.x, w.y, route.cruise_altitude),
                "waypoint {w:?} inside the building"
            );
        }
        assert!(route.expansions < planner.config().max_expansions);
    }

    #[test]
    fn simplified_legs_are_clear_at_cruise_altitude() {
        let planner = wall_planner();
        let route = planner.plan(0.0, 0.0, 400.0, 0.0).expect("detour exists");
        let alt = route.cruise_altitude;
        for leg in route.waypoints.windows(2) {
            assert!(planner.detector().is_path_clear(
                leg[0].x, leg[0].y, alt, leg[1].x, leg[1].y, alt
            ));
        }
    }

    #[test]
    fn repeated_searches_are_identical() {
        let planner = wall_planner();
        let first = planner.find_path(0.0, 0.0, 400.0, 0.0);
        for _ in 0..3 {
            assert_eq!(planner.find_path(0.0, 0.0, 400.0, 0.0), first);
        }
        assert!(!first.is_empty());
    }

    #[test]
    fn sealed_goal_exhausts_budget() {
        // Ring of tall walls around (2000, 2000) in a large open map.
        let walls = vec![
            BuildingVolume::new(1900.0, 1900.0, 10.0, 200.0, 500.0),
            BuildingVolume::new(2090.0, 1900.0, 10.0, 200.0, 500.0),
            BuildingVolume::new(1900.0, 1900.0, 200.0, 10.0, 500.0),
            BuildingVolume::new(1900.0, 2090.0, 200.0, 10.0, 500.0),
        ];
        let planner =
            BuildingAwarePathfinder::new(walls, MapBounds::new(0.0, 0.0, 4000.0, 4000.0));

        let err = planner
            .plan(1000.0, 1000.0, 2000.0, 2000.0)
            .expect_err("goal is sealed");
        assert_eq!(err, PlanError::BudgetExhausted { expansions: 5_000 });
        assert!(planner.find_path(1000.0, 1000.0, 2000.0, 2000.0).is_empty());
    }

    #[test]
    fn small_enclosed_region_is_unreachable() {
        // Wall splitting a 200×200 map in two.
        let planner = BuildingAwarePathfinder::new(
            vec![BuildingVolume::new(90.0, -50.0, 20.0, 300.0, 500.0)],
            MapBounds::new(0.0, 0.0, 200.0, 200.0),
        );
        let err = planner.plan(20.0, 100.0, 180.0, 100.0).expect_err("split map");
        assert!(matches!(err, PlanError::Unreachable { .. }));
        assert!(err.expansions() < 5_000);
    }

    #[test]
    fn destination_outside_bounds_is_unreachable() {
        let planner =
            BuildingAwarePathfinder::new(Vec::new(), MapBounds::new(0.0, 0.0, 200.0, 200.0));
        let err = planner.plan(20.0, 20.0, 400.0, 400.0).expect_err("off map");
        assert!(matches!(err, PlanError::Unreachable { .. }));
    }

    #[test]
    fn waypoints_stay_inside_bounds() {
        let bounds = MapBounds::new(0.0, 0.0, 300.0, 300.0);
        let planner = BuildingAwarePathfinder::new(
            vec![BuildingVolume::new(100.0, 0.0, 50.0, 250.0, 500.0)],
            bounds,
        );
        let route = planner.find_path(20.0, 20.0, 280.0, 20.0);
        assert!(!route.is_empty());
        assert!(route.iter().all(|w| bounds.contains(w.x, w.y)));
    }

    #[test]
    fn zero_deadline_stops_before_expanding() {
        let planner = BuildingAwarePathfinder::with_config(
            Arc::new(CollisionDetector::new(Vec::new())),
            wide_bounds(),
            PathfinderConfig {
                deadline: Some(Duration::ZERO),
                ..PathfinderConfig::default()
            },
        );
        let err = planner.plan(0.0, 0.0, 400.0, 0.0).expect_err("no time");
        assert!(matches!(
            err,
            PlanError::DeadlineExceeded { expansions: 0, .. }
        ));
    }

    #[test]
    fn planner_from_city_uses_city_bounds() {
        let city = StaticCity::new(MapBounds::new(0.0, 0.0, 500.0, 500.0), Vec::new());
        let planner = BuildingAwarePathfinder::from_city(
            &city,
            DetectorConfig::default(),
            PathfinderConfig::default(),
        );
        assert_eq!(planner.bounds(), city.bounds);
        assert_eq!(planner.find_path(0.0, 0.0, 60.0, 0.0).len(), 2);
    }

    #[test]
    fn heap_pops_lowest_f_then_oldest() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry { f: 5.0, seq: 0, node: 0 });
        heap.push(QueueEntry { f: 3.0, seq: 1, node: 1 });
        heap.push(QueueEntry { f: 3.0, seq: 2, node: 2 });
        heap.push(QueueEntry { f: 4.0, seq: 3, node: 3 });
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.node)).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }
}
