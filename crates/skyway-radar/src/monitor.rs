//! [`CollisionMonitor`] – separation checks and accident escalation.
//!
//! Given every agent's position, the monitor classifies each unordered pair
//! by its 3D separation:
//!
//! | Separation              | Outcome                                      |
//! |-------------------------|----------------------------------------------|
//! | `< CRITICAL_DISTANCE`   | `Critical` alert, accident on first contact  |
//! | `< WARNING_DISTANCE`    | `Warning` alert                              |
//! | otherwise               | nothing                                      |
//!
//! Agents whose [`FlightState`] is parked are skipped entirely.  An accident
//! is recorded once per critical encounter: the pair stays open until a scan
//! finds it outside the critical distance, after which a new encounter is
//! recorded again.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use skyway_types::{AccidentRecord, AgentId, FlightState, ProximityEvent, ProximityKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::contacts::Radar;

/// Separation below which a pair is reported as a warning.
pub const WARNING_DISTANCE: f64 = 100.0;

/// Separation below which a pair is reported as critical.
pub const CRITICAL_DISTANCE: f64 = 50.0;

// ────────────────────────────────────────────────────────────────────────────
// Collaborators
// ────────────────────────────────────────────────────────────────────────────

/// Position of one agent at scan time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPosition {
    pub agent: AgentId,
    pub x: f64,
    pub y: f64,
    pub altitude: f64,
}

impl AgentPosition {
    pub fn new(agent: AgentId, x: f64, y: f64, altitude: f64) -> Self {
        Self {
            agent,
            x,
            y,
            altitude,
        }
    }

    fn distance_to(&self, other: &AgentPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.altitude - other.altitude;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Source of each agent's current [`FlightState`].
///
/// Agents the lookup does not know are treated as airborne.
pub trait FlightStateLookup {
    fn flight_state(&self, agent: AgentId) -> Option<FlightState>;
}

impl FlightStateLookup for HashMap<AgentId, FlightState> {
    fn flight_state(&self, agent: AgentId) -> Option<FlightState> {
        self.get(&agent).copied()
    }
}

impl FlightStateLookup for BTreeMap<AgentId, FlightState> {
    fn flight_state(&self, agent: AgentId) -> Option<FlightState> {
        self.get(&agent).copied()
    }
}

impl FlightStateLookup for Radar {
    fn flight_state(&self, agent: AgentId) -> Option<FlightState> {
        self.get(agent).map(|c| c.state)
    }
}

/// Receiver of the monitor's output.
pub trait AccidentSink {
    /// One human-readable alert per proximity event.
    fn alert(&mut self, event: &ProximityEvent, message: &str);

    /// A critical encounter escalated into an accident.
    fn record_accident(&mut self, record: AccidentRecord);
}

/// In-memory [`AccidentSink`] that keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    pub alerts: Vec<(ProximityEvent, String)>,
    pub accidents: Vec<AccidentRecord>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
        self.accidents.clear();
    }
}

impl AccidentSink for AlertLog {
    fn alert(&mut self, event: &ProximityEvent, message: &str) {
        self.alerts.push((*event, message.to_string()));
    }

    fn record_accident(&mut self, record: AccidentRecord) {
        self.accidents.push(record);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CollisionMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Pairwise separation monitor with one-shot accident escalation.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use skyway_radar::{AgentPosition, AlertLog, CollisionMonitor};
/// use skyway_types::{AgentId, FlightState, ProximityKind};
///
/// let mut monitor = CollisionMonitor::new();
/// let mut log = AlertLog::new();
/// let states: HashMap<AgentId, FlightState> = HashMap::new();
/// let agents = [
///     AgentPosition::new(AgentId(1), 500.0, 500.0, 100.0),
///     AgentPosition::new(AgentId(2), 575.0, 500.0, 100.0),
/// ];
///
/// let events = monitor.check_collisions(&agents, &states, &mut log);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].kind, ProximityKind::Warning);
/// assert!(log.accidents.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct CollisionMonitor {
    warning_distance: f64,
    critical_distance: f64,
    /// Pairs (lower id first) currently inside the critical distance.
    open_critical: HashSet<(AgentId, AgentId)>,
}

impl Default for CollisionMonitor {
    fn default() -> Self {
        Self::with_thresholds(WARNING_DISTANCE, CRITICAL_DISTANCE)
    }
}

impl CollisionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom thresholds.  `critical` is capped at `warning`.
    pub fn with_thresholds(warning: f64, critical: f64) -> Self {
        Self {
            warning_distance: warning,
            critical_distance: critical.min(warning),
            open_critical: HashSet::new(),
        }
    }

    pub fn warning_distance(&self) -> f64 {
        self.warning_distance
    }

    pub fn critical_distance(&self) -> f64 {
        self.critical_distance
    }

    /// Number of pairs currently escalated and awaiting separation.
    pub fn open_critical_pairs(&self) -> usize {
        self.open_critical.len()
    }

    /// Classify every pair of non-parked agents and report through `sink`.
    ///
    /// Events are returned in scan order: pairs follow the order of
    /// `agents`, and within a pair the lower id comes first.
    pub fn check_collisions(
        &mut self,
        agents: &[AgentPosition],
        states: &dyn FlightStateLookup,
        sink: &mut dyn AccidentSink,
    ) -> Vec<ProximityEvent> {
        let flying: Vec<&AgentPosition> = agents
            .iter()
            .filter(|a| !states.flight_state(a.agent).is_some_and(FlightState::is_parked))
            .collect();

        let mut events = Vec::new();
        let mut still_critical = HashSet::new();

        for (i, first) in flying.iter().enumerate() {
            for second in &flying[i + 1..] {
                let (a, b) = if first.agent <= second.agent {
                    (*first, *second)
                } else {
                    (*second, *first)
                };
                let distance = a.distance_to(b);
                let kind = if distance < self.critical_distance {
                    ProximityKind::Critical
                } else if distance < self.warning_distance {
                    ProximityKind::Warning
                } else {
                    continue;
                };

                let event = ProximityEvent {
                    kind,
                    agent_a: a.agent,
                    agent_b: b.agent,
                    distance,
                };
                let message = alert_message(&event);
                match kind {
                    ProximityKind::Critical => warn!(
                        agent_a = %a.agent,
                        agent_b = %b.agent,
                        distance,
                        "critical proximity"
                    ),
                    ProximityKind::Warning => info!(
                        agent_a = %a.agent,
                        agent_b = %b.agent,
                        distance,
                        "proximity warning"
                    ),
                }
                sink.alert(&event, &message);

                if kind == ProximityKind::Critical {
                    let pair = (a.agent, b.agent);
                    still_critical.insert(pair);
                    if self.open_critical.insert(pair) {
                        let record = accident_record(a, b, distance, states);
                        warn!(
                            accident = %record.id,
                            agent_a = %a.agent,
                            agent_b = %b.agent,
                            emergency_involved = record.emergency_involved,
                            "accident recorded"
                        );
                        sink.record_accident(record);
                    }
                }
                events.push(event);
            }
        }

        // Pairs that separated (or left the scan) can escalate again.
        self.open_critical.retain(|pair| still_critical.contains(pair));
        events
    }

    /// Scan the radar's live contacts, using the radar itself as the state
    /// source.  An inactive radar produces no events and leaves open pairs
    /// untouched.
    pub fn check_radar(&mut self, radar: &Radar, sink: &mut dyn AccidentSink) -> Vec<ProximityEvent> {
        if !radar.is_active() {
            return Vec::new();
        }
        let positions: Vec<AgentPosition> = radar
            .contacts()
            .map(|c| AgentPosition::new(c.agent, c.x, c.y, c.altitude))
            .collect();
        self.check_collisions(&positions, radar, sink)
    }
}

fn alert_message(event: &ProximityEvent) -> String {
    match event.kind {
        ProximityKind::Critical => format!(
            "CRITICAL: {} and {} are {:.1} units apart - collision imminent",
            event.agent_a, event.agent_b, event.distance
        ),
        ProximityKind::Warning => format!(
            "WARNING: {} and {} within {:.1} units - maintain separation",
            event.agent_a, event.agent_b, event.distance
        ),
    }
}

fn accident_record(
    a: &AgentPosition,
    b: &AgentPosition,
    distance: f64,
    states: &dyn FlightStateLookup,
) -> AccidentRecord {
    let in_emergency = |agent| {
        states
            .flight_state(agent)
            .is_some_and(FlightState::is_emergency_halt)
    };
    AccidentRecord {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        agent_a: a.agent,
        agent_b: b.agent,
        distance,
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
        altitude: (a.altitude + b.altitude) / 2.0,
        emergency_involved: in_emergency(a.agent) || in_emergency(b.agent),
    }
}
