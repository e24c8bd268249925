//! REPL – Read-Eval-Print Loop for the skyway interactive shell.
//!
//! Supported slash-commands:
//!   /help                      – show this list
//!   /city                      – describe the loaded city
//!   /route x1 y1 x2 y2         – plan a route
//!   /spawn x y alt             – add an airborne agent
//!   /move id x y alt           – report a new position for an agent
//!   /state id <state>          – en_route | parking | parked | emergency
//!   /remove id                 – drop an agent
//!   /tick [n]                  – advance the traffic loop n ticks (default 1)
//!   /run secs                  – tick in real time for `secs` seconds
//!   /contacts [x y r]          – list contacts, optionally within a radius
//!   /radar on|off              – switch the radar
//!   /quit | /exit              – leave the shell

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use skyway_geometry::{CityModel, StaticCity};
use skyway_middleware::{BusAlertSink, EventBus, Topic, TopicReceiver, encode_event};
use skyway_planner::BuildingAwarePathfinder;
use skyway_radar::Contact;
use skyway_runtime::{RouteService, TickReport, TrafficLoop};
use skyway_types::{
    AgentId, AgentIdGenerator, EventPayload, FlightState, ProximityEvent, ProximityKind, SkywayError,
};
use tracing::debug;

use crate::config::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    City,
    Route { x1: f64, y1: f64, x2: f64, y2: f64 },
    Spawn { x: f64, y: f64, altitude: f64 },
    Move { agent: AgentId, x: f64, y: f64, altitude: f64 },
    State { agent: AgentId, state: FlightState },
    Remove { agent: AgentId },
    Tick { count: u64 },
    Run { seconds: u64 },
    Contacts { near: Option<(f64, f64, f64)> },
    Radar { on: bool },
    Quit,
}

impl Command {
    /// Parse one input line.  The error is a user-facing usage hint.
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let cmd = match (name, args.as_slice()) {
            ("/help", []) => Command::Help,
            ("/city", []) => Command::City,
            ("/route", [x1, y1, x2, y2]) => Command::Route {
                x1: num(x1)?,
                y1: num(y1)?,
                x2: num(x2)?,
                y2: num(y2)?,
            },
            ("/route", _) => return Err("usage: /route x1 y1 x2 y2".into()),
            ("/spawn", [x, y, alt]) => Command::Spawn {
                x: num(x)?,
                y: num(y)?,
                altitude: num(alt)?,
            },
            ("/spawn", _) => return Err("usage: /spawn x y alt".into()),
            ("/move", [id, x, y, alt]) => Command::Move {
                agent: agent_id(id)?,
                x: num(x)?,
                y: num(y)?,
                altitude: num(alt)?,
            },
            ("/move", _) => return Err("usage: /move id x y alt".into()),
            ("/state", [id, state]) => Command::State {
                agent: agent_id(id)?,
                state: state.parse().map_err(|e| format!("{e}"))?,
            },
            ("/state", _) => return Err("usage: /state id en_route|parking|parked|emergency".into()),
            ("/remove", [id]) => Command::Remove {
                agent: agent_id(id)?,
            },
            ("/remove", _) => return Err("usage: /remove id".into()),
            ("/tick", []) => Command::Tick { count: 1 },
            ("/tick", [n]) => Command::Tick {
                count: n.parse().map_err(|_| format!("'{n}' is not a tick count"))?,
            },
            ("/tick", _) => return Err("usage: /tick [n]".into()),
            ("/run", [secs]) => Command::Run {
                seconds: secs
                    .parse()
                    .map_err(|_| format!("'{secs}' is not a number of seconds"))?,
            },
            ("/run", _) => return Err("usage: /run secs".into()),
            ("/contacts", []) => Command::Contacts { near: None },
            ("/contacts", [x, y, r]) => Command::Contacts {
                near: Some((num(x)?, num(y)?, num(r)?)),
            },
            ("/contacts", _) => return Err("usage: /contacts [x y r]".into()),
            ("/radar", ["on"]) => Command::Radar { on: true },
            ("/radar", ["off"]) => Command::Radar { on: false },
            ("/radar", _) => return Err("usage: /radar on|off".into()),
            ("/quit" | "/exit", []) => Command::Quit,
            _ => return Err(format!("Unknown command '{line}'")),
        };
        Ok(cmd)
    }
}

fn num(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

/// Accept `7`, `JP-0007` or `jp-7`.
fn agent_id(raw: &str) -> Result<AgentId, String> {
    let digits = raw
        .strip_prefix("JP-")
        .or_else(|| raw.strip_prefix("jp-"))
        .unwrap_or(raw);
    digits
        .parse()
        .map(AgentId)
        .map_err(|_| format!("'{raw}' is not an agent id"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the shell operates on.
pub struct Session {
    cfg: Config,
    city: StaticCity,
    routes: RouteService,
    traffic: TrafficLoop<BusAlertSink>,
    accidents: TopicReceiver,
    runtime: tokio::runtime::Runtime,
    shutdown: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        cfg: Config,
        city: StaticCity,
        bus: EventBus,
        runtime: tokio::runtime::Runtime,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let planner = Arc::new(BuildingAwarePathfinder::from_city(
            &city,
            cfg.detector_config(),
            cfg.pathfinder_config(),
        ));
        // The outer timeout leaves the planner's own deadline room to fire.
        let routes = RouteService::new(planner, cfg.planner_deadline() + Duration::from_millis(500))
            .with_bus(bus.clone());
        let accidents = bus.subscribe_to(Topic::Accidents);
        let traffic = TrafficLoop::new(
            cfg.traffic_config(),
            AgentIdGenerator::default(),
            BusAlertSink::new(bus.clone(), "skyway-radar::monitor"),
        )
        .with_bus(bus);
        Self {
            cfg,
            city,
            routes,
            traffic,
            accidents,
            runtime,
            shutdown,
        }
    }

    /// Execute one command.  Returns `false` when the shell should exit.
    pub fn execute(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Help => cmd_help(),
            Command::City => self.cmd_city(),
            Command::Route { x1, y1, x2, y2 } => self.cmd_route(x1, y1, x2, y2),
            Command::Spawn { x, y, altitude } => {
                let agent = self.traffic.spawn_agent(x, y, altitude);
                println!("{} {}", "✓ Spawned".green(), agent.to_string().bold());
            }
            Command::Move {
                agent,
                x,
                y,
                altitude,
            } => {
                let result = self.traffic.update_agent(agent, x, y, altitude);
                self.report(result, "moved", agent)
            }
            Command::State { agent, state } => {
                let result = self.traffic.set_state(agent, state);
                self.report(result, "updated", agent)
            }
            Command::Remove { agent } => {
                let result = self.traffic.remove_agent(agent).map(|_| ());
                self.report(result, "removed", agent)
            }
            Command::Tick { count } => {
                for _ in 0..count {
                    let report = self.traffic.tick();
                    print_tick(&report);
                }
                self.drain_accidents();
            }
            Command::Run { seconds } => self.cmd_run(seconds),
            Command::Contacts { near } => self.cmd_contacts(near),
            Command::Radar { on } => {
                self.traffic.radar_mut().set_active(on);
                println!("  Radar {}", if on { "ON".green() } else { "OFF".yellow() });
            }
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                self.shutdown.store(true, Ordering::SeqCst);
                return false;
            }
        }
        true
    }

    pub fn traffic(&self) -> &TrafficLoop<BusAlertSink> {
        &self.traffic
    }

    fn report(&self, result: Result<(), SkywayError>, verb: &str, agent: AgentId) {
        match result {
            Ok(()) => println!("{} {} {verb}", "✓".green(), agent.to_string().bold()),
            Err(e) => println!("{}: {e}", "Error".red()),
        }
    }

    fn cmd_city(&self) {
        let b = self.city.bounds();
        println!("{}", "City".bold().underline());
        println!(
            "  Bounds    : ({}, {}) – ({}, {})",
            b.min_x, b.min_y, b.max_x, b.max_y
        );
        println!("  Buildings : {}", self.city.buildings().len());
        let tallest = self
            .city
            .buildings()
            .iter()
            .map(|b| b.height)
            .fold(0.0, f64::max);
        println!("  Tallest   : {tallest}");
        println!(
            "  Source    : {}",
            self.cfg.city_file.as_deref().unwrap_or("built-in demo city")
        );
    }

    fn cmd_route(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        match self.runtime.block_on(self.routes.plan(None, x1, y1, x2, y2)) {
            Ok(route) => {
                println!(
                    "{} {} waypoints at cruise altitude {} ({} nodes expanded)",
                    "✓ Route:".green(),
                    route.waypoints.len(),
                    route.cruise_altitude,
                    route.expansions
                );
                for (i, w) in route.waypoints.iter().enumerate() {
                    println!("    {i:>3}  ({:.1}, {:.1})", w.x, w.y);
                }
            }
            Err(e) => println!("{} {e}", "✗ No route:".red()),
        }
    }

    fn cmd_run(&mut self, seconds: u64) {
        let interval = self.cfg.tick_interval();
        let ticks = ticks_for(seconds, interval);
        println!(
            "  Running {ticks} ticks every {} ms (Ctrl-C to stop) …",
            interval.as_millis()
        );
        let mut scans = 0u64;
        self.runtime.block_on(self.traffic.run(
            interval,
            Some(ticks),
            self.shutdown.clone(),
            |report| {
                scans += 1;
                print_tick(report);
            },
        ));
        self.drain_accidents();
        println!("  {scans} scans, {} ticks total", self.traffic.ticks());
    }

    fn cmd_contacts(&self, near: Option<(f64, f64, f64)>) {
        let radar = self.traffic.radar();
        let listed: Vec<&Contact> = match near {
            Some((x, y, r)) => radar.contacts_in_radius(x, y, r),
            None => radar.contacts().collect(),
        };
        if listed.is_empty() {
            println!("  {}", "No contacts.".dimmed());
            return;
        }
        for c in listed {
            println!(
                "  {}  ({:.1}, {:.1}) alt {:.1}  {:?}",
                c.agent.to_string().bold(),
                c.x,
                c.y,
                c.altitude,
                c.state
            );
        }
    }

    fn drain_accidents(&mut self) {
        while let Some(event) = self.accidents.try_recv() {
            if let EventPayload::Accident(record) = &event.payload {
                println!(
                    "  {} {} ↔ {} at ({:.1}, {:.1}, {:.1})",
                    "ACCIDENT".red().bold(),
                    record.agent_a,
                    record.agent_b,
                    record.x,
                    record.y,
                    record.altitude
                );
            }
            match encode_event(&event) {
                Ok(line) => debug!(event = %line, "accident event"),
                Err(e) => debug!(error = %e, "accident event not encodable"),
            }
        }
    }
}

/// Ticks that fit in `seconds` at `interval`, saturating on huge inputs.
fn ticks_for(seconds: u64, interval: Duration) -> u64 {
    let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
    seconds.saturating_mul(1000) / millis
}

fn print_tick(report: &TickReport) {
    for agent in &report.pruned {
        println!("  tick {}: {} lost (stale)", report.tick, agent);
    }
    for event in &report.events {
        println!("  tick {}: {}", report.tick, describe(event));
    }
}

fn describe(event: &ProximityEvent) -> String {
    let text = format!(
        "{} {} / {} at {:.1}",
        event.kind, event.agent_a, event.agent_b, event.distance
    );
    match event.kind {
        ProximityKind::Critical => text.red().bold().to_string(),
        ProximityKind::Warning => text.yellow().to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut session: Session) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if session.shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "skyway>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Ok(cmd) => {
                if !session.execute(cmd) {
                    break;
                }
            }
            Err(msg) => println!(
                "{} Type {} for available commands.",
                msg.red(),
                "/help".bold()
            ),
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Skyway Commands".bold().underline());
    let rows = [
        ("/city", "describe the loaded city"),
        ("/route x1 y1 x2 y2", "plan a route around buildings"),
        ("/spawn x y alt", "add an airborne agent"),
        ("/move id x y alt", "report a new agent position"),
        ("/state id <state>", "en_route | parking | parked | emergency"),
        ("/remove id", "drop an agent"),
        ("/tick [n]", "advance the traffic loop"),
        ("/run secs", "tick in real time"),
        ("/contacts [x y r]", "list radar contacts"),
        ("/radar on|off", "switch the radar"),
        ("/quit  /exit", "exit the shell"),
    ];
    for (cmd, what) in rows {
        println!("  {:<20} – {what}", cmd.bold().cyan());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::demo_city;

    fn session() -> Session {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let cfg = Config {
            scan_every_n_ticks: 1,
            tick_interval_ms: 1,
            ..Config::default()
        };
        Session::new(
            cfg,
            demo_city(),
            EventBus::default(),
            runtime,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(Command::parse("/help"), Ok(Command::Help));
        assert_eq!(
            Command::parse("/route 0 0 400 0"),
            Ok(Command::Route {
                x1: 0.0,
                y1: 0.0,
                x2: 400.0,
                y2: 0.0
            })
        );
        assert_eq!(
            Command::parse("/move JP-0003 1 2 100"),
            Ok(Command::Move {
                agent: AgentId(3),
                x: 1.0,
                y: 2.0,
                altitude: 100.0
            })
        );
        assert_eq!(
            Command::parse("/state 2 parked"),
            Ok(Command::State {
                agent: AgentId(2),
                state: FlightState::Parked
            })
        );
        assert_eq!(Command::parse("/tick"), Ok(Command::Tick { count: 1 }));
        assert_eq!(Command::parse("/tick 12"), Ok(Command::Tick { count: 12 }));
        assert_eq!(
            Command::parse("/contacts 10 20 50"),
            Ok(Command::Contacts {
                near: Some((10.0, 20.0, 50.0))
            })
        );
        assert_eq!(Command::parse("/radar off"), Ok(Command::Radar { on: false }));
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("/route 1 2 3").is_err());
        assert!(Command::parse("/spawn a b c").is_err());
        assert!(Command::parse("/spawn NaN 0 100").is_err());
        assert!(Command::parse("/state 1 hovering").is_err());
        assert!(Command::parse("/radar maybe").is_err());
        assert!(Command::parse("/dance").is_err());
    }

    #[test]
    fn spawn_tick_and_quit() {
        let mut s = session();
        assert!(s.execute(Command::Spawn {
            x: 500.0,
            y: 500.0,
            altitude: 100.0
        }));
        s.execute(Command::Spawn {
            x: 510.0,
            y: 510.0,
            altitude: 100.0,
        });
        s.execute(Command::Tick { count: 2 });
        assert_eq!(s.traffic().ticks(), 2);
        assert_eq!(s.traffic().monitor().open_critical_pairs(), 1);

        assert!(!s.execute(Command::Quit));
        assert!(s.shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn state_and_remove_reach_the_traffic_loop() {
        let mut s = session();
        s.execute(Command::Spawn {
            x: 0.0,
            y: 0.0,
            altitude: 100.0,
        });
        s.execute(Command::State {
            agent: AgentId(1),
            state: FlightState::Parked,
        });
        assert_eq!(
            s.traffic().radar().get(AgentId(1)).map(|c| c.state),
            Some(FlightState::Parked)
        );
        s.execute(Command::Remove { agent: AgentId(1) });
        assert!(s.traffic().radar().is_empty());
    }

    #[test]
    fn run_length_saturates_instead_of_overflowing() {
        assert_eq!(
            Command::parse("/run 20000000000000000"),
            Ok(Command::Run {
                seconds: 20_000_000_000_000_000
            })
        );
        assert_eq!(ticks_for(3, Duration::from_millis(100)), 30);
        assert_eq!(
            ticks_for(20_000_000_000_000_000, Duration::from_millis(100)),
            u64::MAX / 100
        );
        assert_eq!(ticks_for(u64::MAX, Duration::ZERO), u64::MAX);
    }

    #[test]
    fn run_ticks_in_real_time() {
        let mut s = session();
        s.execute(Command::Run { seconds: 0 });
        assert_eq!(s.traffic().ticks(), 0);
    }

    #[test]
    fn route_command_uses_the_route_service() {
        let s = session();
        s.cmd_route(100.0, 100.0, 500.0, 100.0);
        let route = s
            .runtime
            .block_on(s.routes.plan(None, 100.0, 100.0, 160.0, 100.0))
            .expect("short hop");
        assert_eq!(route.waypoints.len(), 2);
    }
}
