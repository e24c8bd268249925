//! `skyway-middleware` – event plumbing.
//!
//! Carries traffic events between the engine and whoever listens (the CLI,
//! loggers, external dashboards) without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`alert_sink`] – [`BusAlertSink`][alert_sink::BusAlertSink]: the
//!   production [`AccidentSink`][skyway_radar::AccidentSink] that turns
//!   collision-monitor output into bus events.

pub mod alert_sink;
pub mod bus;

pub use alert_sink::BusAlertSink;
pub use bus::{EventBus, Topic, TopicReceiver, encode_event};
