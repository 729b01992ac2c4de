//! Named-topic event bus for realtime fan-out.
//!
//! Topics are strings: `rooms` for the global lobby list, `room_<id>` for a
//! room's lobby traffic, `battle_<id>` for in-battle traffic. Each topic is a
//! broadcast channel, which gives per-topic FIFO delivery to every subscriber.
//!
//! Publishing is best-effort by contract: a publish to a topic with no
//! subscribers (or with only lagged subscribers) is not an error, and callers
//! never observe failures. Slow consumers are dropped by the transport and
//! re-sync with a `request_*` intent.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::protocol::{RoomId, ServerEvent};

/// Global lobby topic carrying room-list updates.
pub const ROOMS_TOPIC: &str = "rooms";

/// Topic for a room's lobby traffic.
pub fn room_topic(room_id: &RoomId) -> String {
    format!("room_{room_id}")
}

/// Topic for a room's battle traffic.
pub fn battle_topic(room_id: &RoomId) -> String {
    format!("battle_{room_id}")
}

/// In-process pub/sub hub keyed by topic name.
///
/// Events are `Arc`-wrapped so fanning one event out to N subscribers clones
/// a pointer, not the payload.
pub struct EventBus {
    topics: DashMap<String, broadcast::Sender<Arc<ServerEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event to a topic. Infallible from the caller's perspective.
    pub fn publish(&self, topic: &str, event: ServerEvent) {
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();

        // send() only errors when there are no receivers; that is a normal
        // condition for an idle topic.
        let receivers = sender.send(Arc::new(event)).unwrap_or(0);
        tracing::trace!(topic, receivers, "Event published");
    }

    /// Subscribe to a topic, creating it if needed. Events published after
    /// this call are delivered in publish order.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop a topic once its room has been purged. Existing subscribers see
    /// channel closure and disconnect.
    pub fn remove_topic(&self, topic: &str) {
        self.topics.remove(topic);
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_publish_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe("rooms");

        for n in 0..5u32 {
            bus.publish(
                "rooms",
                ServerEvent::Countdown {
                    countdown: n,
                    is_ranked: false,
                },
            );
        }

        for expected in 0..5u32 {
            let event = rx.recv().await.unwrap();
            match *event {
                ServerEvent::Countdown { countdown, .. } => assert_eq!(countdown, expected),
                _ => panic!("unexpected event"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(16);
        bus.publish("room_nobody", ServerEvent::Pong);
        assert_eq!(bus.subscriber_count("room_nobody"), 0);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::new(16);
        let mut lobby_rx = bus.subscribe("room_a");
        let mut battle_rx = bus.subscribe("battle_a");

        bus.publish("room_a", ServerEvent::Pong);

        let event = lobby_rx.recv().await.unwrap();
        assert!(matches!(*event, ServerEvent::Pong));
        assert!(battle_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removed_topic_closes_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe("room_gone");
        bus.remove_topic("room_gone");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn topic_names_follow_convention() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            room_topic(&id),
            "room_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            battle_topic(&id),
            "battle_00000000-0000-0000-0000-000000000000"
        );
    }
}
