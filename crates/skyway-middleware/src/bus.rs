//! Typed, topic-based publish/subscribe event bus for traffic events.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Contact updates from the radar, every tick |
//! | [`Topic::ProximityAlerts`] | Warning / critical separation alerts |
//! | [`Topic::Accidents`] | Escalated [`AccidentRecord`][skyway_types::AccidentRecord]s |
//! | [`Topic::Routes`] | Finished route plans |

use skyway_types::{Event, SkywayError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// High-frequency agent positions.
    Telemetry,
    /// Human-readable proximity alerts.
    ProximityAlerts,
    /// Accident records.
    Accidents,
    /// Route planning results.
    Routes,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    proximity_alerts: broadcast::Sender<Event>,
    accidents: broadcast::Sender<Event>,
    routes: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (proximity_alerts, _) = broadcast::channel(capacity);
        let (accidents, _) = broadcast::channel(capacity);
        let (routes, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            proximity_alerts,
            accidents,
            routes,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of receivers handed the event, or
    /// [`SkywayError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, SkywayError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| SkywayError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::ProximityAlerts => &self.proximity_alerts,
            Topic::Accidents => &self.accidents,
            Topic::Routes => &self.routes,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Render an event as a single JSON line.
pub fn encode_event(event: &Event) -> Result<String, SkywayError> {
    serde_json::to_string(event).map_err(|e| SkywayError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Topic receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Surfaces `Lagged(n)` when the subscriber fell behind and `Closed`
    /// when every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, skipping over lag.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "topic receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
