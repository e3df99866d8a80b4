//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{ModeEvent, Notice, SyncEvent};

/// Default capacity of each topic channel.
pub const DEFAULT_CAPACITY: usize = 100;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Storage mode transitions
    Mode,
    /// Remote snapshots and queue activity
    Sync,
    /// Messages meant for banners, toasts, and modals
    Notice,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Mode(ModeEvent),
    Sync(SyncEvent),
    Notice(Notice),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Mode(_) => Topic::Mode,
            Event::Sync(_) => Topic::Sync,
            Event::Notice(_) => Topic::Notice,
        }
    }
}

/// Topic-based event bus
///
/// Cloning is cheap; clones share the same channels.
#[derive(Clone)]
pub struct EventBus {
    mode: broadcast::Sender<Event>,
    sync: broadcast::Sender<Event>,
    notice: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            mode: broadcast::channel(capacity).0,
            sync: broadcast::channel(capacity).0,
            notice: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Mode => &self.mode,
            Topic::Sync => &self.sync,
            Topic::Notice => &self.notice,
        }
    }

    /// Publish an event to its corresponding topic
    ///
    /// Delivery is best-effort: with no subscribers the event is dropped.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    pub fn notify(&self, notice: Notice) {
        match &notice {
            Notice::SetupRequired { .. } | Notice::MigrationFailed { .. } => {
                tracing::warn!(?notice, "notice")
            }
            _ => tracing::info!(?notice, "notice"),
        }
        self.publish(Event::Notice(notice));
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::StorageMode;

    #[tokio::test]
    async fn test_events_are_routed_by_topic() {
        let bus = EventBus::with_capacity(8);
        let mut mode_rx = bus.subscribe(Topic::Mode);
        let mut notice_rx = bus.subscribe(Topic::Notice);

        bus.publish(Event::Mode(ModeEvent {
            new: StorageMode::Persistent,
            old: StorageMode::Session,
        }));
        bus.notify(Notice::UpgradeSuggested {
            user: "Ada".to_string(),
        });

        match mode_rx.recv().await.unwrap() {
            Event::Mode(event) => assert_eq!(event.new, StorageMode::Persistent),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            notice_rx.recv().await.unwrap(),
            Event::Notice(Notice::UpgradeSuggested { .. })
        ));
        assert!(mode_rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.notify(Notice::WriteQueued {
            key: "budget".to_string(),
            pending: 1,
        });
    }
}
