//! [`TrafficLoop`] – the tick driver for live traffic.
//!
//! The loop owns the fleet: it hands out agent ids, keeps the [`Radar`]
//! current, and every `scan_every_n_ticks` ticks runs the
//! [`CollisionMonitor`] over the live contacts.  Each tick:
//!
//! 1. **Prune** – when a contact TTL is configured, drop contacts whose last
//!    report is older than the TTL.
//! 2. **Broadcast** – on scan ticks, publish every contact to
//!    [`Topic::Telemetry`] (when a bus is attached).
//! 3. **Scan** – on scan ticks, classify proximities and hand alerts and
//!    accidents to the [`AccidentSink`].
//!
//! Moving agents along their routes is the caller's job; the loop only
//! records where they are.
//!
//! # Example
//!
//! ```rust
//! use skyway_radar::AlertLog;
//! use skyway_runtime::traffic_loop::{TrafficLoop, TrafficLoopConfig};
//! use skyway_types::AgentIdGenerator;
//!
//! let mut traffic = TrafficLoop::new(
//!     TrafficLoopConfig { scan_every_n_ticks: 1, ..Default::default() },
//!     AgentIdGenerator::default(),
//!     AlertLog::new(),
//! );
//! traffic.spawn_agent(500.0, 500.0, 100.0);
//! traffic.spawn_agent(510.0, 510.0, 100.0);
//!
//! let report = traffic.tick();
//! assert_eq!(report.events.len(), 1);
//! assert_eq!(traffic.sink().accidents.len(), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use skyway_middleware::{EventBus, Topic};
use skyway_radar::{
    AccidentSink, CRITICAL_DISTANCE, CollisionMonitor, Contact, Radar, WARNING_DISTANCE,
};
use skyway_types::{
    AgentId, AgentIdGenerator, Event, EventPayload, FlightState, ProximityEvent, SkywayError,
};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`TrafficLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficLoopConfig {
    /// Run the proximity scan on every Nth tick; `0` is treated as `1`.
    pub scan_every_n_ticks: u64,
    /// Drop contacts that have not reported for this long.  `None` keeps
    /// contacts until they are removed explicitly.
    pub contact_ttl: Option<Duration>,
    pub warning_distance: f64,
    pub critical_distance: f64,
}

impl Default for TrafficLoopConfig {
    fn default() -> Self {
        Self {
            scan_every_n_ticks: 5,
            contact_ttl: None,
            warning_distance: WARNING_DISTANCE,
            critical_distance: CRITICAL_DISTANCE,
        }
    }
}

/// What one [`TrafficLoop::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// The proximity scan ran on this tick.
    pub scanned: bool,
    pub events: Vec<ProximityEvent>,
    /// Agents dropped for exceeding the contact TTL.
    pub pruned: Vec<AgentId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// TrafficLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Single-owner traffic state: fleet registry, radar, monitor and sink.
pub struct TrafficLoop<S: AccidentSink> {
    config: TrafficLoopConfig,
    ids: AgentIdGenerator,
    radar: Radar,
    monitor: CollisionMonitor,
    sink: S,
    bus: Option<EventBus>,
    tick: u64,
}

impl<S: AccidentSink> TrafficLoop<S> {
    pub fn new(config: TrafficLoopConfig, ids: AgentIdGenerator, sink: S) -> Self {
        let monitor =
            CollisionMonitor::with_thresholds(config.warning_distance, config.critical_distance);
        Self {
            config,
            ids,
            radar: Radar::new(),
            monitor,
            sink,
            bus: None,
            tick: 0,
        }
    }

    /// Publish contact telemetry on scan ticks.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &TrafficLoopConfig {
        &self.config
    }

    pub fn radar(&self) -> &Radar {
        &self.radar
    }

    /// Mutable radar access, e.g. to switch it on or off.
    pub fn radar_mut(&mut self) -> &mut Radar {
        &mut self.radar
    }

    pub fn monitor(&self) -> &CollisionMonitor {
        &self.monitor
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    // ── Fleet ────────────────────────────────────────────────────────────────

    /// Register a new airborne agent and return its id.
    pub fn spawn_agent(&mut self, x: f64, y: f64, altitude: f64) -> AgentId {
        let agent = self.ids.next_id();
        self.radar
            .add_contact(agent, x, y, altitude, FlightState::EnRoute);
        info!(%agent, x, y, altitude, "agent spawned");
        agent
    }

    /// Record a new position for `agent`, keeping its flight state.
    pub fn update_agent(
        &mut self,
        agent: AgentId,
        x: f64,
        y: f64,
        altitude: f64,
    ) -> Result<(), SkywayError> {
        let state = self.state_of(agent)?;
        self.radar.update_contact(agent, x, y, altitude, state);
        Ok(())
    }

    /// Change the flight state of `agent` in place.
    pub fn set_state(&mut self, agent: AgentId, state: FlightState) -> Result<(), SkywayError> {
        let contact = self
            .radar
            .get(agent)
            .cloned()
            .ok_or(SkywayError::UnknownAgent(agent))?;
        self.radar
            .update_contact(agent, contact.x, contact.y, contact.altitude, state);
        debug!(%agent, ?state, "flight state changed");
        Ok(())
    }

    pub fn remove_agent(&mut self, agent: AgentId) -> Result<Contact, SkywayError> {
        let contact = self
            .radar
            .remove_contact(agent)
            .ok_or(SkywayError::UnknownAgent(agent))?;
        info!(%agent, "agent removed");
        Ok(contact)
    }

    fn state_of(&self, agent: AgentId) -> Result<FlightState, SkywayError> {
        self.radar
            .get(agent)
            .map(|c| c.state)
            .ok_or(SkywayError::UnknownAgent(agent))
    }

    // ── Ticking ──────────────────────────────────────────────────────────────

    /// Advance the loop by one tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        if let Some(ttl) = self.config.contact_ttl {
            report.pruned = self.radar.prune_stale(Utc::now(), ttl);
        }

        let every = self.config.scan_every_n_ticks.max(1);
        if self.tick % every == 0 {
            self.broadcast_contacts();
            report.events = self.monitor.check_radar(&self.radar, &mut self.sink);
            report.scanned = true;
            if !report.events.is_empty() {
                debug!(tick = self.tick, events = report.events.len(), "proximity scan");
            }
        }
        report
    }

    /// Tick every `interval` until `shutdown` is set or `max_ticks` ticks
    /// have run.  Each scan report is handed to `on_scan` as it happens;
    /// nothing is retained, so an open-ended run stays in constant memory.
    /// Returns the number of ticks run.
    pub async fn run<F>(
        &mut self,
        interval: Duration,
        max_ticks: Option<u64>,
        shutdown: Arc<AtomicBool>,
        mut on_scan: F,
    ) -> u64
    where
        F: FnMut(&TickReport),
    {
        let mut timer = tokio::time::interval(interval);
        let mut ran = 0u64;
        info!(interval_ms = interval.as_millis() as u64, "traffic loop started");
        while !shutdown.load(Ordering::SeqCst) && max_ticks.is_none_or(|max| ran < max) {
            timer.tick().await;
            let report = self.tick();
            ran += 1;
            if report.scanned {
                on_scan(&report);
            }
        }
        info!(ticks = ran, "traffic loop stopped");
        ran
    }

    fn broadcast_contacts(&self) {
        let Some(bus) = &self.bus else {
            return;
        };
        if !self.radar.is_active() || bus.subscriber_count(Topic::Telemetry) == 0 {
            return;
        }
        for c in self.radar.contacts() {
            let event = Event::new(
                "skyway-runtime::traffic_loop",
                EventPayload::ContactUpdate {
                    agent: c.agent,
                    x: c.x,
                    y: c.y,
                    altitude: c.altitude,
                },
            );
            if let Err(e) = bus.publish_to(Topic::Telemetry, event) {
                debug!(error = %e, "telemetry not delivered");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyway_radar::AlertLog;
    use skyway_types::ProximityKind;

    fn every_tick() -> TrafficLoop<AlertLog> {
        TrafficLoop::new(
            TrafficLoopConfig {
                scan_every_n_ticks: 1,
                ..TrafficLoopConfig::default()
            },
            AgentIdGenerator::default(),
            AlertLog::new(),
        )
    }

    #[test]
    fn ids_come_from_the_injected_generator() {
        let mut traffic = TrafficLoop::new(
            TrafficLoopConfig::default(),
            AgentIdGenerator::starting_at(40),
            AlertLog::new(),
        );
        assert_eq!(traffic.spawn_agent(0.0, 0.0, 100.0), AgentId(40));
        assert_eq!(traffic.spawn_agent(0.0, 0.0, 100.0), AgentId(41));
    }

    #[test]
    fn scan_runs_every_nth_tick() {
        let mut traffic = TrafficLoop::new(
            TrafficLoopConfig::default(),
            AgentIdGenerator::default(),
            AlertLog::new(),
        );
        traffic.spawn_agent(500.0, 500.0, 100.0);
        traffic.spawn_agent(575.0, 500.0, 100.0);

        let scanned: Vec<bool> = (0..10).map(|_| traffic.tick().scanned).collect();
        assert_eq!(
            scanned,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
        assert_eq!(traffic.sink().alerts.len(), 2);
        assert_eq!(traffic.ticks(), 10);
    }

    #[test]
    fn parked_agents_are_excluded() {
        let mut traffic = every_tick();
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);
        traffic.spawn_agent(10.0, 0.0, 100.0);
        traffic.set_state(a, FlightState::Parked).expect("known agent");
        assert!(traffic.tick().events.is_empty());
    }

    #[test]
    fn moving_apart_rearms_accident_escalation() {
        let mut traffic = every_tick();
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);
        let b = traffic.spawn_agent(10.0, 0.0, 100.0);

        assert_eq!(traffic.tick().events[0].kind, ProximityKind::Critical);
        traffic.tick();
        assert_eq!(traffic.sink().accidents.len(), 1);

        traffic.update_agent(b, 500.0, 0.0, 100.0).expect("known agent");
        assert!(traffic.tick().events.is_empty());

        traffic.update_agent(a, 495.0, 0.0, 100.0).expect("known agent");
        traffic.tick();
        assert_eq!(traffic.sink().accidents.len(), 2);
    }

    #[test]
    fn update_keeps_flight_state() {
        let mut traffic = every_tick();
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);
        traffic.set_state(a, FlightState::Emergency).expect("known agent");
        traffic.update_agent(a, 5.0, 5.0, 100.0).expect("known agent");
        assert_eq!(
            traffic.radar().get(a).map(|c| c.state),
            Some(FlightState::Emergency)
        );
    }

    #[test]
    fn unknown_agents_are_reported() {
        let mut traffic = every_tick();
        assert!(matches!(
            traffic.update_agent(AgentId(99), 0.0, 0.0, 0.0),
            Err(SkywayError::UnknownAgent(AgentId(99)))
        ));
        assert!(traffic.set_state(AgentId(99), FlightState::Parked).is_err());
        assert!(traffic.remove_agent(AgentId(99)).is_err());
    }

    #[test]
    fn removed_agents_leave_the_scan() {
        let mut traffic = every_tick();
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);
        traffic.spawn_agent(10.0, 0.0, 100.0);
        assert_eq!(traffic.remove_agent(a).map(|c| c.agent).ok(), Some(a));
        assert!(traffic.tick().events.is_empty());
    }

    #[test]
    fn switched_off_radar_suppresses_scans() {
        let mut traffic = every_tick();
        traffic.spawn_agent(0.0, 0.0, 100.0);
        traffic.spawn_agent(10.0, 0.0, 100.0);
        traffic.radar_mut().set_active(false);
        assert!(traffic.tick().events.is_empty());
        assert!(traffic.sink().alerts.is_empty());
    }

    #[test]
    fn zero_ttl_prunes_silent_contacts() {
        let mut traffic = TrafficLoop::new(
            TrafficLoopConfig {
                contact_ttl: Some(Duration::ZERO),
                ..TrafficLoopConfig::default()
            },
            AgentIdGenerator::default(),
            AlertLog::new(),
        );
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);
        std::thread::sleep(Duration::from_millis(5));
        let report = traffic.tick();
        assert_eq!(report.pruned, vec![a]);
        assert!(traffic.radar().is_empty());
    }

    #[tokio::test]
    async fn run_stops_after_max_ticks_and_publishes_telemetry() {
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut traffic = every_tick().with_bus(bus);
        let a = traffic.spawn_agent(0.0, 0.0, 100.0);

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut scanned_ticks = Vec::new();
        let ran = traffic
            .run(Duration::from_millis(1), Some(3), shutdown, |r| {
                scanned_ticks.push(r.tick)
            })
            .await;
        assert_eq!(ran, 3);
        assert_eq!(scanned_ticks, vec![1, 2, 3]);
        assert_eq!(traffic.ticks(), 3);

        let event = telemetry.try_recv().expect("telemetry published");
        assert!(matches!(
            event.payload,
            EventPayload::ContactUpdate { agent, .. } if agent == a
        ));
    }

    #[tokio::test]
    async fn run_honours_shutdown_flag() {
        let mut traffic = every_tick();
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut scans = 0;
        let ran = traffic
            .run(Duration::from_millis(1), None, shutdown, |_| scans += 1)
            .await;
        assert_eq!((ran, scans), (0, 0));
        assert_eq!(traffic.ticks(), 0);
    }

    #[tokio::test]
    async fn open_ended_run_streams_reports_until_shutdown() {
        let mut traffic = every_tick();
        traffic.spawn_agent(0.0, 0.0, 100.0);
        traffic.spawn_agent(10.0, 0.0, 100.0);

        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let mut critical = 0usize;
        let ran = traffic
            .run(Duration::from_millis(1), None, shutdown, |r| {
                critical += r.events.len();
                if r.tick == 50 {
                    stop.store(true, Ordering::SeqCst);
                }
            })
            .await;
        assert_eq!(ran, 50);
        assert_eq!(critical, 50);
        assert_eq!(traffic.sink().accidents.len(), 1);
    }
}
