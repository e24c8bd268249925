//! [`RouteService`] – route planning off the async executor.
//!
//! A search can expand thousands of nodes, so it runs on Tokio's blocking
//! pool and the caller awaits the result.  Two limits bound the wait: the
//! pathfinder's own deadline (checked between expansions) and an outer
//! [`tokio::time::timeout`] on the join handle.  Whichever fires first turns
//! into [`SkywayError::PlannerTimeout`].

use std::sync::Arc;
use std::time::Duration;

use skyway_middleware::{EventBus, Topic};
use skyway_planner::{BuildingAwarePathfinder, PlanError, Route};
use skyway_types::{AgentId, Event, EventPayload, SkywayError};
use tracing::{debug, info, warn};

/// Async front end to a shared [`BuildingAwarePathfinder`].
#[derive(Debug, Clone)]
pub struct RouteService {
    planner: Arc<BuildingAwarePathfinder>,
    timeout: Duration,
    bus: Option<EventBus>,
}

impl RouteService {
    pub fn new(planner: Arc<BuildingAwarePathfinder>, timeout: Duration) -> Self {
        Self {
            planner,
            timeout,
            bus: None,
        }
    }

    /// Publish every planning result to [`Topic::Routes`].
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn planner(&self) -> &Arc<BuildingAwarePathfinder> {
        &self.planner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Plan a route for `agent` (if any) from `(start_x, start_y)` to
    /// `(dest_x, dest_y)`.
    pub async fn plan(
        &self,
        agent: Option<AgentId>,
        start_x: f64,
        start_y: f64,
        dest_x: f64,
        dest_y: f64,
    ) -> Result<Route, SkywayError> {
        let planner = Arc::clone(&self.planner);
        let task =
            tokio::task::spawn_blocking(move || planner.plan(start_x, start_y, dest_x, dest_y));

        let not_found = |reason: String| SkywayError::RouteNotFound {
            from_x: start_x,
            from_y: start_y,
            to_x: dest_x,
            to_y: dest_y,
            reason,
        };

        let result = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "route planning timed out");
                Err(SkywayError::PlannerTimeout {
                    budget_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(join)) => Err(not_found(format!("planner task failed: {join}"))),
            Ok(Ok(Err(PlanError::DeadlineExceeded { expansions, .. }))) => {
                let budget = self.planner.config().deadline.unwrap_or(self.timeout);
                info!(expansions, "planner deadline exceeded");
                Err(SkywayError::PlannerTimeout {
                    budget_ms: budget.as_millis() as u64,
                })
            }
            Ok(Ok(Err(e))) => Err(not_found(e.to_string())),
            Ok(Ok(Ok(route))) => Ok(route),
        };

        self.announce(agent, &result);
        result
    }

    fn announce(&self, agent: Option<AgentId>, result: &Result<Route, SkywayError>) {
        let Some(bus) = &self.bus else {
            return;
        };
        let waypoints = match result {
            Ok(route) => route.waypoints.clone(),
            Err(_) => Vec::new(),
        };
        let event = Event::new(
            "skyway-runtime::routing",
            EventPayload::RoutePlanned { agent, waypoints },
        );
        if let Err(e) = bus.publish_to(Topic::Routes, event) {
            debug!(error = %e, "route result not delivered");
        }
    }
}
