//! Server metrics: cheap atomic counters snapshotted for the `/metrics`
//! endpoint. Counters never block the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ServerMetrics {
    rooms_created: AtomicU64,
    rooms_joined: AtomicU64,
    rooms_closed: AtomicU64,
    rooms_reaped: AtomicU64,
    participants_kicked: AtomicU64,
    battles_started: AtomicU64,
    battles_completed: AtomicU64,
    submissions_received: AtomicU64,
    submissions_accepted: AtomicU64,
    judge_failures: AtomicU64,
    chat_messages: AtomicU64,
    ws_connections: AtomicU64,
    ws_disconnections: AtomicU64,
    events_published: AtomicU64,
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_closed: u64,
    pub rooms_reaped: u64,
    pub participants_kicked: u64,
    pub battles_started: u64,
    pub battles_completed: u64,
    pub submissions_received: u64,
    pub submissions_accepted: u64,
    pub judge_failures: u64,
    pub chat_messages: u64,
    pub ws_connections: u64,
    pub ws_disconnections: u64,
    pub events_published: u64,
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_rooms_created, rooms_created);
    counter!(increment_rooms_joined, rooms_joined);
    counter!(increment_rooms_closed, rooms_closed);
    counter!(increment_rooms_reaped, rooms_reaped);
    counter!(increment_participants_kicked, participants_kicked);
    counter!(increment_battles_started, battles_started);
    counter!(increment_battles_completed, battles_completed);
    counter!(increment_submissions_received, submissions_received);
    counter!(increment_submissions_accepted, submissions_accepted);
    counter!(increment_judge_failures, judge_failures);
    counter!(increment_chat_messages, chat_messages);
    counter!(increment_ws_connections, ws_connections);
    counter!(increment_ws_disconnections, ws_disconnections);
    counter!(increment_events_published, events_published);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
            rooms_closed: self.rooms_closed.load(Ordering::Relaxed),
            rooms_reaped: self.rooms_reaped.load(Ordering::Relaxed),
            participants_kicked: self.participants_kicked.load(Ordering::Relaxed),
            battles_started: self.battles_started.load(Ordering::Relaxed),
            battles_completed: self.battles_completed.load(Ordering::Relaxed),
            submissions_received: self.submissions_received.load(Ordering::Relaxed),
            submissions_accepted: self.submissions_accepted.load(Ordering::Relaxed),
            judge_failures: self.judge_failures.load(Ordering::Relaxed),
            chat_messages: self.chat_messages.load(Ordering::Relaxed),
            ws_connections: self.ws_connections.load(Ordering::Relaxed),
            ws_disconnections: self.ws_disconnections.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}
