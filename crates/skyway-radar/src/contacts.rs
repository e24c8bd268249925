//! [`Radar`] – registry of live agent contacts.
//!
//! The flight layer reports every jetpack's position through
//! [`Radar::add_contact`] / [`Radar::update_contact`].  The radar keeps the
//! latest report per agent and answers two questions: "who is near this
//! point?" and "which pairs are too close to each other?".
//!
//! Contacts never expire on their own.  Each report is timestamped, and a
//! supervisor that wants a TTL calls [`Radar::prune_stale`] explicitly.
//!
//! While the radar is switched off (see [`Radar::set_active`]) registration
//! still works, but every query returns nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use skyway_types::{AgentId, FlightState, ProximityEvent, ProximityKind};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Contact
// ────────────────────────────────────────────────────────────────────────────

/// Latest reported position and state of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub agent: AgentId,
    pub x: f64,
    pub y: f64,
    pub altitude: f64,
    pub state: FlightState,
    /// Wall-clock time of the report that produced this contact.
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Horizontal distance from the contact to `(x, y)`.
    pub fn horizontal_distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    /// Straight-line 3D distance between two contacts.
    pub fn distance_to(&self, other: &Contact) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.altitude - other.altitude;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Age of the report at `now`; zero when the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Radar
// ────────────────────────────────────────────────────────────────────────────

/// Contact registry keyed by [`AgentId`].
///
/// Contacts are stored in agent order, so every query returns them in a
/// deterministic order.
///
/// # Example
///
/// ```
/// use skyway_radar::Radar;
/// use skyway_types::{AgentId, FlightState, ProximityKind};
///
/// let mut radar = Radar::new();
/// radar.add_contact(AgentId(1), 500.0, 500.0, 100.0, FlightState::EnRoute);
/// radar.add_contact(AgentId(2), 510.0, 500.0, 100.0, FlightState::EnRoute);
///
/// let events = radar.check_for_collisions(50.0);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].kind, ProximityKind::Critical);
/// ```
#[derive(Debug, Clone)]
pub struct Radar {
    contacts: BTreeMap<AgentId, Contact>,
    active: bool,
}

impl Default for Radar {
    fn default() -> Self {
        Self {
            contacts: BTreeMap::new(),
            active: true,
        }
    }
}

impl Radar {
    /// Create an empty, active radar.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Switch the radar on or off.  Contacts are kept either way.
    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            debug!(active, "radar switched");
        }
        self.active = active;
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, agent: AgentId) -> Option<&Contact> {
        self.contacts.get(&agent)
    }

    /// All contacts in agent order, regardless of activation.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    /// Insert `agent`, replacing any previous contact for it.
    pub fn add_contact(
        &mut self,
        agent: AgentId,
        x: f64,
        y: f64,
        altitude: f64,
        state: FlightState,
    ) {
        self.contacts.insert(
            agent,
            Contact {
                agent,
                x,
                y,
                altitude,
                state,
                updated_at: Utc::now(),
            },
        );
    }

    /// Replace the contact for a known `agent` and refresh its timestamp.
    ///
    /// Returns `false` and changes nothing when `agent` is not registered.
    pub fn update_contact(
        &mut self,
        agent: AgentId,
        x: f64,
        y: f64,
        altitude: f64,
        state: FlightState,
    ) -> bool {
        match self.contacts.get_mut(&agent) {
            Some(contact) => {
                *contact = Contact {
                    agent,
                    x,
                    y,
                    altitude,
                    state,
                    updated_at: Utc::now(),
                };
                true
            }
            None => false,
        }
    }

    pub fn remove_contact(&mut self, agent: AgentId) -> Option<Contact> {
        self.contacts.remove(&agent)
    }

    /// Contacts whose horizontal distance to `(cx, cy)` is at most `radius`.
    pub fn contacts_in_radius(&self, cx: f64, cy: f64, radius: f64) -> Vec<&Contact> {
        if !self.active {
            return Vec::new();
        }
        self.contacts
            .values()
            .filter(|c| c.horizontal_distance_to(cx, cy) <= radius)
            .collect()
    }

    /// Pairwise proximity scan over every non-parked contact.
    ///
    /// A pair closer than `threshold` yields one event: `Critical` below
    /// half the threshold, `Warning` otherwise.  `agent_a` is always the
    /// lower id.
    pub fn check_for_collisions(&self, threshold: f64) -> Vec<ProximityEvent> {
        if !self.active {
            return Vec::new();
        }
        let flying: Vec<&Contact> = self
            .contacts
            .values()
            .filter(|c| !c.state.is_parked())
            .collect();

        let mut events = Vec::new();
        for (i, a) in flying.iter().enumerate() {
            for b in &flying[i + 1..] {
                let distance = a.distance_to(b);
                if distance < threshold {
                    let kind = if distance < threshold / 2.0 {
                        ProximityKind::Critical
                    } else {
                        ProximityKind::Warning
                    };
                    events.push(ProximityEvent {
                        kind,
                        agent_a: a.agent,
                        agent_b: b.agent,
                        distance,
                    });
                }
            }
        }
        events
    }

    /// Agents whose latest report is older than `max_age` at `now`.
    pub fn stale_contacts(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<AgentId> {
        self.contacts
            .values()
            .filter(|c| c.age(now) > max_age)
            .map(|c| c.agent)
            .collect()
    }

    /// Remove every stale contact and return the removed agents.
    pub fn prune_stale(&mut self, now: DateTime<Utc>, max_age: Duration) -> Vec<AgentId> {
        let stale = self.stale_contacts(now, max_age);
        for agent in &stale {
            self.contacts.remove(agent);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "pruned stale contacts");
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn radar_with(points: &[(u64, f64, f64, f64)]) -> Radar {
        let mut radar = Radar::new();
        for &(id, x, y, alt) in points {
            radar.add_contact(AgentId(id), x, y, alt, FlightState::EnRoute);
        }
        radar
    }

    // ── registry ────────────────────────────────────────────────────────────

    #[test]
    fn add_overwrites_existing_contact() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        radar.add_contact(AgentId(1), 5.0, 6.0, 120.0, FlightState::Parking);
        assert_eq!(radar.len(), 1);
        let c = radar.get(AgentId(1)).expect("contact");
        assert_eq!((c.x, c.y, c.altitude), (5.0, 6.0, 120.0));
        assert_eq!(c.state, FlightState::Parking);
    }

    #[test]
    fn update_of_unknown_agent_is_noop() {
        let mut radar = Radar::new();
        assert!(!radar.update_contact(AgentId(9), 1.0, 1.0, 1.0, FlightState::EnRoute));
        assert!(radar.is_empty());
    }

    #[test]
    fn update_replaces_position_and_refreshes_timestamp() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        let before = radar.get(AgentId(1)).expect("contact").updated_at;
        assert!(radar.update_contact(AgentId(1), 50.0, 60.0, 130.0, FlightState::Emergency));
        let c = radar.get(AgentId(1)).expect("contact");
        assert_eq!((c.x, c.y, c.altitude), (50.0, 60.0, 130.0));
        assert_eq!(c.state, FlightState::Emergency);
        assert!(c.updated_at >= before);
    }

    #[test]
    fn remove_returns_contact() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        assert_eq!(radar.remove_contact(AgentId(1)).map(|c| c.agent), Some(AgentId(1)));
        assert!(radar.remove_contact(AgentId(1)).is_none());
    }

    // ── queries ─────────────────────────────────────────────────────────────

    #[test]
    fn radius_query_is_horizontal_and_inclusive() {
        let radar = radar_with(&[
            (1, 0.0, 0.0, 100.0),
            (2, 30.0, 40.0, 290.0),
            (3, 30.0, 41.0, 100.0),
        ]);
        let hits: Vec<AgentId> = radar
            .contacts_in_radius(0.0, 0.0, 50.0)
            .into_iter()
            .map(|c| c.agent)
            .collect();
        assert_eq!(hits, vec![AgentId(1), AgentId(2)]);
    }

    #[test]
    fn collision_scan_classifies_by_half_threshold() {
        let radar = radar_with(&[
            (1, 500.0, 500.0, 100.0),
            (2, 510.0, 510.0, 100.0),
            (3, 900.0, 900.0, 100.0),
            (4, 975.0, 900.0, 100.0),
        ]);
        let events = radar.check_for_collisions(100.0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ProximityKind::Critical);
        assert_eq!((events[0].agent_a, events[0].agent_b), (AgentId(1), AgentId(2)));
        assert_eq!(events[1].kind, ProximityKind::Warning);
        assert_eq!((events[1].agent_a, events[1].agent_b), (AgentId(3), AgentId(4)));
    }

    #[test]
    fn collision_scan_uses_altitude() {
        let radar = radar_with(&[(1, 0.0, 0.0, 100.0), (2, 0.0, 0.0, 250.0)]);
        assert!(radar.check_for_collisions(100.0).is_empty());
    }

    #[test]
    fn parked_contacts_are_ignored_by_scan() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        radar.add_contact(AgentId(2), 5.0, 0.0, 100.0, FlightState::Parked);
        assert!(radar.check_for_collisions(100.0).is_empty());
        assert_eq!(radar.contacts_in_radius(0.0, 0.0, 10.0).len(), 2);
    }

    #[test]
    fn inactive_radar_reports_nothing() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0), (2, 1.0, 0.0, 100.0)]);
        radar.set_active(false);
        assert!(radar.contacts_in_radius(0.0, 0.0, 100.0).is_empty());
        assert!(radar.check_for_collisions(100.0).is_empty());
        assert_eq!(radar.len(), 2);

        radar.set_active(true);
        assert_eq!(radar.check_for_collisions(100.0).len(), 1);
    }

    // ── staleness ───────────────────────────────────────────────────────────

    #[test]
    fn nothing_is_stale_right_away() {
        let radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        assert!(radar.stale_contacts(Utc::now(), Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn prune_removes_only_old_contacts() {
        let mut radar = radar_with(&[(1, 0.0, 0.0, 100.0), (2, 10.0, 0.0, 100.0)]);
        let later = Utc::now() + TimeDelta::seconds(30);
        // Agent 2 reports again "later"; agent 1 stays silent.
        if let Some(c) = radar.contacts.get_mut(&AgentId(2)) {
            c.updated_at = later;
        }

        let removed = radar.prune_stale(later, Duration::from_secs(10));
        assert_eq!(removed, vec![AgentId(1)]);
        assert!(radar.get(AgentId(1)).is_none());
        assert!(radar.get(AgentId(2)).is_some());
    }

    #[test]
    fn age_never_goes_negative() {
        let radar = radar_with(&[(1, 0.0, 0.0, 100.0)]);
        let c = radar.get(AgentId(1)).expect("contact");
        assert_eq!(c.age(c.updated_at - TimeDelta::seconds(5)), Duration::ZERO);
    }
}
