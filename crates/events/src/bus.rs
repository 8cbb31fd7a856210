use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::EventEnvelope;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast bus for workflow events.
///
/// Publishing is fire-and-forget: with no subscribers the event is
/// dropped, and slow subscribers lag instead of backpressuring the
/// workflow.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    published: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all subscribers. Returns the number of
    /// subscribers that received it.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(envelope) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since creation.
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("published_count", &self.published_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let envelope = EventEnvelope::new(Event::RunCreated {
            run_id: Uuid::new_v4(),
            url: "https://example.test".to_string(),
        });

        assert_eq!(bus.publish(envelope.clone()), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, envelope.id);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        let envelope = EventEnvelope::new(Event::Error {
            message: "boom".to_string(),
            context: None,
        });

        assert_eq!(bus.publish(envelope), 0);
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let envelope = EventEnvelope::new(Event::RunCompleted {
            run_id: Uuid::new_v4(),
            status: "passed".to_string(),
        });
        let id = envelope.id;

        assert_eq!(bus.publish(envelope), 2);
        assert_eq!(rx1.recv().await.unwrap().id, id);
        assert_eq!(rx2.recv().await.unwrap().id, id);
    }

    #[test]
    fn test_clone_shares_channel() {
        let bus = EventBus::new();
        let other = bus.clone();

        let _rx = other.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }
}
