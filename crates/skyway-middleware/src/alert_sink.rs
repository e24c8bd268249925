//! [`BusAlertSink`] – delivers collision-monitor output over the event bus.

use skyway_radar::AccidentSink;
use skyway_types::{AccidentRecord, Event, EventPayload, ProximityEvent};
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// [`AccidentSink`] that publishes alerts to [`Topic::ProximityAlerts`] and
/// accidents to [`Topic::Accidents`].
///
/// Delivery is best-effort: a topic without subscribers is logged at debug
/// level and otherwise ignored.
#[derive(Debug, Clone)]
pub struct BusAlertSink {
    bus: EventBus,
    source: String,
    published: usize,
}

impl BusAlertSink {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
            published: 0,
        }
    }

    /// Events that reached at least one subscriber.
    pub fn published(&self) -> usize {
        self.published
    }

    fn send(&mut self, topic: Topic, payload: EventPayload) {
        match self.bus.publish_to(topic, Event::new(self.source.clone(), payload)) {
            Ok(_) => self.published += 1,
            Err(e) => debug!(?topic, error = %e, "alert dropped"),
        }
    }
}

impl AccidentSink for BusAlertSink {
    fn alert(&mut self, event: &ProximityEvent, message: &str) {
        self.send(
            Topic::ProximityAlerts,
            EventPayload::Proximity {
                event: *event,
                message: message.to_string(),
            },
        );
    }

    fn record_accident(&mut self, record: AccidentRecord) {
        self.send(Topic::Accidents, EventPayload::Accident(record));
    }
}
