//! `skyway-runtime` – the engine's moving parts.
//!
//! Wires the planner, radar and event bus into something that runs: a tick
//! loop for live traffic and an async front end for route planning.
//!
//! # Modules
//!
//! - [`traffic_loop`] – [`TrafficLoop`][traffic_loop::TrafficLoop]: owns the
//!   fleet registry, [`Radar`][skyway_radar::Radar] and
//!   [`CollisionMonitor`][skyway_radar::CollisionMonitor], and runs the
//!   proximity scan every Nth tick.
//! - [`routing`] – [`RouteService`][routing::RouteService]: runs
//!   [`BuildingAwarePathfinder`][skyway_planner::BuildingAwarePathfinder]
//!   searches on the blocking pool under a deadline.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod routing;
pub mod telemetry;
pub mod traffic_loop;

pub use routing::RouteService;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use traffic_loop::{TickReport, TrafficLoop, TrafficLoopConfig};
