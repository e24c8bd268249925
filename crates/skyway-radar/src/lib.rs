//! `skyway-radar` – agent tracking and separation monitoring.
//!
//! Where `skyway-geometry` keeps jetpacks away from buildings, this crate
//! keeps them away from each other.
//!
//! # Modules
//!
//! - [`contacts`] – [`Radar`][contacts::Radar]: the registry of live
//!   [`Contact`][contacts::Contact]s with radius queries, a threshold-based
//!   pairwise scan, an on/off switch and explicit staleness pruning.
//! - [`monitor`] – [`CollisionMonitor`][monitor::CollisionMonitor]: the
//!   fixed warning/critical classifier that alerts through an
//!   [`AccidentSink`][monitor::AccidentSink] and escalates critical
//!   encounters into [`AccidentRecord`][skyway_types::AccidentRecord]s.

pub mod contacts;
pub mod monitor;

pub use contacts::{Contact, Radar};
pub use monitor::{
    AccidentSink, AgentPosition, AlertLog, CRITICAL_DISTANCE, CollisionMonitor,
    FlightStateLookup, WARNING_DISTANCE,
};
