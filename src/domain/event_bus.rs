//! Ingest notifications.
//!
//! The ingest service publishes a [`MetricsEvent`] for every stored source
//! record and every failed fetch. The combiner subscribes and recomputes
//! the combined record of each domain it hears about.

use tokio::sync::broadcast;

use super::MetricsEvent;

/// Fan-out of ingest events to the combiner and any other subscriber.
///
/// Holds at most `EVENT_BUS_CAPACITY` undelivered events. A combiner that
/// falls further behind gets `RecvError::Lagged`, logs a warning and
/// continues with the oldest event still held. Combined records of domains
/// whose events were dropped are stale until their next
/// `SourceRecordStored`, or until `POST /metrics/{domain}/combine`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MetricsEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event` and returns how many subscribers will see it.
    ///
    /// With no subscribers (ingest-only deployments, most tests) the event
    /// is discarded and `0` is returned.
    pub fn publish(&self, event: MetricsEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MetricsEvent> {
        self.sender.subscribe()
    }

    /// Live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::domain::{DomainId, SourceTag};
    use chrono::Utc;

    fn make_event(domain: &str) -> MetricsEvent {
        let Ok(domain) = DomainId::parse(domain) else {
            panic!("valid domain");
        };
        MetricsEvent::SourceRecordStored {
            domain,
            source: SourceTag::WooCommerce,
            record_timestamp: 1_700_000_000,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        let count = bus.publish(make_event("a.com"));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(make_event("a.com"));

        let event = rx.recv().await;
        let Ok(event) = event else {
            panic!("expected to receive event");
        };
        assert_eq!(event.domain().as_str(), "a.com");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let count = bus.publish(make_event("b.com"));
        assert_eq!(count, 2);

        let (Ok(e1), Ok(e2)) = (rx1.recv().await, rx2.recv().await) else {
            panic!("receivers failed");
        };
        assert_eq!(e1.domain(), e2.domain());
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_skips_dropped_events() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for domain in ["a.com", "b.com", "c.com"] {
            bus.publish(make_event(domain));
        }

        let Err(RecvError::Lagged(skipped)) = rx.recv().await else {
            panic!("expected lag");
        };
        assert_eq!(skipped, 1);
        let (Ok(next), Ok(last)) = (rx.recv().await, rx.recv().await) else {
            panic!("held events expected");
        };
        assert_eq!(next.domain().as_str(), "b.com");
        assert_eq!(last.domain().as_str(), "c.com");
    }
}
