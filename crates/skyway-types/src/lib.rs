use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a tracked jetpack.  Rendered as a callsign (`JP-0007`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JP-{:04}", self.0)
    }
}

/// Hands out sequential [`AgentId`]s.
///
/// Owned by whichever component creates agents; there is no process-wide
/// counter.
#[derive(Debug, Clone)]
pub struct AgentIdGenerator {
    next: u64,
}

impl AgentIdGenerator {
    /// Start numbering at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Return the next unused id.
    pub fn next_id(&mut self) -> AgentId {
        let id = AgentId(self.next);
        self.next += 1;
        id
    }
}

impl Default for AgentIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Lifecycle state of a flight as seen by the collision subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightState {
    /// Airborne and following a route.
    #[default]
    EnRoute,
    /// Descending into a parking slot; still airborne.
    Parking,
    /// On the ground; excluded from proximity checks.
    Parked,
    /// Halted in the air after an emergency.
    Emergency,
}

impl FlightState {
    pub fn is_parked(self) -> bool {
        matches!(self, FlightState::Parked)
    }

    pub fn is_emergency_halt(self) -> bool {
        matches!(self, FlightState::Emergency)
    }
}

impl std::str::FromStr for FlightState {
    type Err = SkywayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en_route" | "enroute" => Ok(FlightState::EnRoute),
            "parking" => Ok(FlightState::Parking),
            "parked" => Ok(FlightState::Parked),
            "emergency" => Ok(FlightState::Emergency),
            other => Err(SkywayError::Config(format!("unknown flight state '{other}'"))),
        }
    }
}

/// Axis-aligned building obstacle.
///
/// `(x, y)` is the minimum corner of the footprint; `width` extends along
/// +x, `length` along +y.  The volume rises from the ground to `height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingVolume {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl BuildingVolume {
    pub fn new(x: f64, y: f64, width: f64, length: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            length,
            height,
        }
    }

    /// True when `(px, py)` lies in the footprint grown by `inflate` on every
    /// side.
    pub fn footprint_contains(&self, px: f64, py: f64, inflate: f64) -> bool {
        px >= self.x - inflate
            && px <= self.x + self.width + inflate
            && py >= self.y - inflate
            && py <= self.y + self.length + inflate
    }
}

/// Inclusive rectangle bounding the navigable map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MapBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// A 2-D route point.  Altitude is chosen by the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Severity tier of a proximity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProximityKind {
    Warning,
    Critical,
}

impl fmt::Display for ProximityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProximityKind::Warning => write!(f, "WARNING"),
            ProximityKind::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Two agents closer than a separation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityEvent {
    pub kind: ProximityKind,
    pub agent_a: AgentId,
    pub agent_b: AgentId,
    pub distance: f64,
}

impl ProximityEvent {
    /// True when `agent` is one side of the pair.
    pub fn involves(&self, agent: AgentId) -> bool {
        self.agent_a == agent || self.agent_b == agent
    }
}

/// A critical proximity escalated into an accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_a: AgentId,
    pub agent_b: AgentId,
    pub distance: f64,
    /// Midpoint of the two agents at detection time.
    pub x: f64,
    pub y: f64,
    pub altitude: f64,
    /// Either agent was halted in an emergency when the accident occurred.
    pub emergency_involved: bool,
}

/// Unified event wrapper for the traffic event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "skyway-runtime::traffic_loop"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the traffic event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Latest radar position of one agent.
    ContactUpdate {
        agent: AgentId,
        x: f64,
        y: f64,
        altitude: f64,
    },
    /// Classified proximity between two agents plus its alert text.
    Proximity { event: ProximityEvent, message: String },
    Accident(AccidentRecord),
    /// A route finished planning (successfully or not).
    RoutePlanned {
        agent: Option<AgentId>,
        waypoints: Vec<Waypoint>,
    },
}

/// Error type shared across the skyway crates.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum SkywayError {
    #[error("No route from ({from_x}, {from_y}) to ({to_x}, {to_y}): {reason}")]
    RouteNotFound {
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        reason: String,
    },

    #[error("Route planning exceeded its {budget_ms} ms deadline")]
    PlannerTimeout { budget_ms: u64 },

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}
