//! Applies inbound server events to the [`StateStore`].
//!
//! | event              | effect                                   | when                 |
//! |--------------------|------------------------------------------|----------------------|
//! | `tool_call`        | show notification                        | immediately          |
//! | `chat_message`     | clear notification, append entry         | `delay` after arrival |
//! | `sequence_updated` | clear notification, replace sequence     | `delay` after arrival |
//! | `error`            | log, broadcast `ServerError`             | immediately          |
//!
//! A delayed clear is skipped when a newer tool call arrived after the
//! result did, so the latest notice stays visible until its own result.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::event_bus::{ClientEvent, EventBus};
use crate::protocol::InboundEvent;
use crate::store::StateStore;
use crate::types::{ConversationEntry, OutreachItem};

enum Reveal {
    Entry(ConversationEntry),
    Sequence(Vec<OutreachItem>),
}

pub struct EventReconciler {
    store: Arc<StateStore>,
    event_bus: Arc<EventBus>,
    delay: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl EventReconciler {
    pub fn new(
        store: Arc<StateStore>,
        event_bus: Arc<EventBus>,
        delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            event_bus,
            delay,
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Apply one event. Must be called from within a tokio runtime, in
    /// arrival order.
    pub fn apply(&self, event: InboundEvent) {
        if self.cancel.is_cancelled() {
            log::debug!("Dropping {} after shutdown", event.name());
            return;
        }

        match event {
            InboundEvent::ToolCall { message } => {
                self.store.show_notification(&message);
            }
            InboundEvent::ChatMessage { role, message } => {
                self.schedule(Reveal::Entry(ConversationEntry::new(role, message)));
            }
            InboundEvent::SequenceUpdated { sequence } => {
                self.schedule(Reveal::Sequence(sequence));
            }
            InboundEvent::Error { message } => {
                log::warn!("Server error: {}", message);
                self.event_bus.emit(ClientEvent::ServerError { message });
            }
        }
    }

    fn schedule(&self, reveal: Reveal) {
        let deadline = Instant::now() + self.delay;
        let generation = self.store.notification_generation();
        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Pending reveal cancelled");
                }
                _ = tokio::time::sleep_until(deadline) => match reveal {
                    Reveal::Entry(entry) => store.reveal_entry(entry, generation),
                    Reveal::Sequence(sequence) => store.reveal_sequence(sequence, generation),
                },
            }
        });
    }

    /// Number of reveals still waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel pending reveals and wait until none can still run.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
