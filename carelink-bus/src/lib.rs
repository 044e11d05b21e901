//! Typed in-process publish/subscribe.
//!
//! A single broadcast channel carries every [`Event`]; subscribers filter by
//! [`Topic`]. Because all events flow through one channel, ordering per
//! `(topic, incident)` follows publication order. Delivery is at-least-once
//! within the process: a lagging subscriber is told how many events it
//! missed rather than silently skipping them.

use tokio::sync::broadcast;
use tracing::trace;

use carelink_core::{Event, Topic};

/// Default buffer size for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// The internal event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish one event. Returns the number of subscribers that will see
    /// it; zero subscribers is not an error.
    pub fn publish(&self, event: Event) -> usize {
        trace!(topic = %event.topic(), "bus publish");
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to every topic.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Subscribe to a single topic.
    #[must_use]
    pub fn subscribe_topic(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            inner: self.tx.subscribe(),
            topic,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver filtered to one topic.
pub struct TopicReceiver {
    inner: broadcast::Receiver<Event>,
    topic: Topic,
}

impl TopicReceiver {
    /// Receive the next event on this topic.
    ///
    /// Lagged events on other topics are skipped transparently; a lag on
    /// this receiver surfaces as [`broadcast::error::RecvError::Lagged`].
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        loop {
            let event = self.inner.recv().await?;
            if event.topic() == self.topic {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::{
        IncidentEvent, IncidentEventKind, IncidentId, Language, SessionId, Utterance,
    };

    fn utterance_event(id: &str) -> Event {
        Event::Utterance(Utterance::new(id, "s-1", "你好", Language::Zh, 0.9))
    }

    fn incident_event(kind: IncidentEventKind) -> Event {
        Event::Incident(IncidentEvent {
            incident: IncidentId::new("inc-1"),
            session: SessionId::new("s-1"),
            kind,
        })
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(utterance_event("u-1")), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), Topic::AudioUtterance);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(utterance_event("u-1")), 0);
    }

    #[tokio::test]
    async fn topic_receiver_filters() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_topic(Topic::IncidentEvent);
        bus.publish(utterance_event("u-1"));
        bus.publish(incident_event(IncidentEventKind::Resolved));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), Topic::IncidentEvent);
    }

    #[tokio::test]
    async fn per_incident_order_is_publication_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_topic(Topic::IncidentEvent);
        bus.publish(incident_event(IncidentEventKind::CallingRung {
            rung: 0,
            contact: carelink_core::ContactId::new("daughter"),
        }));
        bus.publish(incident_event(IncidentEventKind::Resolved));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            Event::Incident(IncidentEvent {
                kind: IncidentEventKind::CallingRung { .. },
                ..
            })
        ));
        assert!(matches!(
            second,
            Event::Incident(IncidentEvent {
                kind: IncidentEventKind::Resolved,
                ..
            })
        ));
    }
}
