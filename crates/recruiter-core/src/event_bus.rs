//! Broadcasting of client-visible state changes.
//!
//! The EventBus lets a front end render incrementally: every mutation of the
//! [`StateStore`](crate::store::StateStore) and every connection status change
//! is published as a [`ClientEvent`].
//!
//! # Example
//!
//! ```rust
//! use recruiter_core::event_bus::{ClientEvent, EventBus};
//! use std::sync::Arc;
//!
//! let event_bus = Arc::new(EventBus::new());
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit(ClientEvent::NotificationChanged { text: Some("Working...".into()) });
//!
//! // In async context:
//! // let event = rx.recv().await.unwrap();
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::session::SessionId;
use crate::types::{ConversationEntry, OutreachItem};

/// Default channel capacity for the event bus.
/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 1024;

/// User-visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    /// Connected and joined to a session.
    Joined,
    Disconnected,
    /// Negotiation gave up after exhausting its retries.
    NegotiationFailed,
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Joined => "joined",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::NegotiationFailed => "negotiation failed",
            ConnectionStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// A change the front end may want to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientEvent {
    StatusChanged { status: ConnectionStatus },
    SessionJoined { session_id: SessionId },
    NegotiationFailed { attempts: u32, reason: String },
    NotificationChanged { text: Option<String> },
    ConversationAppended { entry: ConversationEntry },
    SequenceReplaced { sequence: Vec<OutreachItem> },
    SequenceItemEdited { id: String, content: String },
    ServerError { message: String },
}

/// Publish-subscribe channel for [`ClientEvent`]s.
///
/// Uses a tokio broadcast channel internally, allowing multiple consumers to
/// receive the same events concurrently.
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new EventBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, the event is dropped and 0 is returned.
    pub fn emit(&self, event: ClientEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
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

    fn notification(text: &str) -> ClientEvent {
        ClientEvent::NotificationChanged {
            text: Some(text.to_string()),
        }
    }

    mod client_event {
        use super::*;

        #[test]
        fn serializes_with_kind_tag() {
            let event = ClientEvent::StatusChanged {
                status: ConnectionStatus::NegotiationFailed,
            };
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["kind"], "statusChanged");
            assert_eq!(value["status"], "negotiationFailed");
        }

        #[test]
        fn status_display() {
            assert_eq!(ConnectionStatus::Joined.to_string(), "joined");
            assert_eq!(
                ConnectionStatus::NegotiationFailed.to_string(),
                "negotiation failed"
            );
        }
    }

    mod event_bus {
        use super::*;

        #[test]
        fn new_creates_bus() {
            let bus = EventBus::new();
            assert_eq!(bus.subscriber_count(), 0);
        }

        #[test]
        fn subscribe_increments_count() {
            let bus = EventBus::default();
            let _rx1 = bus.subscribe();
            let _rx2 = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 2);
        }

        #[test]
        fn dropped_subscriber_decrements_count() {
            let bus = EventBus::new();
            let rx = bus.subscribe();
            drop(rx);
            assert_eq!(bus.subscriber_count(), 0);
        }

        #[test]
        fn emit_returns_zero_with_no_subscribers() {
            let bus = EventBus::new();
            assert_eq!(bus.emit(notification("x")), 0);
        }

        #[tokio::test]
        async fn multiple_subscribers_receive_same_event() {
            let bus = EventBus::new();
            let mut rx1 = bus.subscribe();
            let mut rx2 = bus.subscribe();

            assert_eq!(bus.emit(notification("Searching")), 2);

            assert_eq!(rx1.recv().await.unwrap(), notification("Searching"));
            assert_eq!(rx2.recv().await.unwrap(), notification("Searching"));
        }

        #[tokio::test]
        async fn events_arrive_in_order() {
            let bus = EventBus::new();
            let mut rx = bus.subscribe();

            bus.emit(notification("1"));
            bus.emit(ClientEvent::NotificationChanged { text: None });

            assert_eq!(rx.recv().await.unwrap(), notification("1"));
            assert_eq!(
                rx.recv().await.unwrap(),
                ClientEvent::NotificationChanged { text: None }
            );
        }

        #[tokio::test]
        async fn slow_subscriber_experiences_lag() {
            let bus = EventBus::with_capacity(2);
            let mut rx = bus.subscribe();

            bus.emit(notification("1"));
            bus.emit(notification("2"));
            bus.emit(notification("3"));

            assert!(matches!(
                rx.recv().await,
                Err(broadcast::error::RecvError::Lagged(1))
            ));
        }
    }
}
