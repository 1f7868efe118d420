//! Client-visible state: conversation log, outreach sequence, notification.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::connection::ConnectionManager;
use crate::event_bus::{ClientEvent, EventBus};
use crate::persistence::IdentityStore;
use crate::protocol::OutboundEvent;
use crate::transport::TransportError;
use crate::types::{ConversationEntry, OutreachItem};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("No session has been established yet")]
    NoSession,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Default)]
struct StoreState {
    conversation: Vec<ConversationEntry>,
    sequence: Vec<OutreachItem>,
    notification: Option<String>,
    /// Bumped by every tool invocation.
    notification_generation: u64,
}

/// Holds the conversation log, the outreach sequence and the notification slot.
///
/// Front ends only read snapshots and call the two user actions. The
/// reconciler and client mutate through the crate-internal entry points.
/// Every mutation is published on the [`EventBus`].
pub struct StateStore {
    state: Mutex<StoreState>,
    connection: Arc<ConnectionManager>,
    identity: Arc<IdentityStore>,
    event_bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(
        connection: Arc<ConnectionManager>,
        identity: Arc<IdentityStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            connection,
            identity,
            event_bus,
        }
    }

    /// Send a chat message as the user.
    ///
    /// Returns `Ok(false)` for blank input, which is dropped without sending.
    /// Nothing is appended when the send fails.
    pub fn append_user_message(&self, text: &str) -> Result<bool, StoreError> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        let session_id = self.identity.session_id().ok_or(StoreError::NoSession)?;

        self.connection.send(OutboundEvent::ChatMessage {
            session_id,
            message: text.to_string(),
        })?;

        let entry = ConversationEntry::user(text);
        let mut state = self.state.lock().unwrap();
        state.conversation.push(entry.clone());
        self.event_bus.emit(ClientEvent::ConversationAppended { entry });
        Ok(true)
    }

    /// Replace the content of one sequence item and tell the server.
    ///
    /// The update is sent even when `id` is not in the local sequence; the
    /// server's next snapshot is authoritative either way.
    pub fn edit_sequence_item(&self, id: &str, content: &str) -> Result<bool, StoreError> {
        if content.trim().is_empty() {
            return Ok(false);
        }
        let session_id = self.identity.session_id().ok_or(StoreError::NoSession)?;

        self.connection.send(OutboundEvent::UpdateSequence {
            session_id,
            msg_id: id.to_string(),
            content: content.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        match state.sequence.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.content = content.to_string();
                self.event_bus.emit(ClientEvent::SequenceItemEdited {
                    id: id.to_string(),
                    content: content.to_string(),
                });
            }
            None => log::debug!("Edited sequence item {} is not in the local sequence", id),
        }
        Ok(true)
    }

    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.state.lock().unwrap().conversation.clone()
    }

    pub fn sequence(&self) -> Vec<OutreachItem> {
        self.state.lock().unwrap().sequence.clone()
    }

    pub fn notification(&self) -> Option<String> {
        self.state.lock().unwrap().notification.clone()
    }

    pub fn notification_generation(&self) -> u64 {
        self.state.lock().unwrap().notification_generation
    }

    /// Show a tool-invocation notice, replacing any visible one.
    pub(crate) fn show_notification(&self, text: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.notification_generation += 1;
        state.notification = Some(text.to_string());
        self.event_bus.emit(ClientEvent::NotificationChanged {
            text: Some(text.to_string()),
        });
        state.notification_generation
    }

    /// Apply a delayed chat result.
    ///
    /// `generation` is the notification generation observed when the result
    /// arrived. The notification is only cleared if no tool invocation
    /// happened since then; the entry is appended regardless.
    pub(crate) fn reveal_entry(&self, entry: ConversationEntry, generation: u64) {
        let mut state = self.state.lock().unwrap();
        self.clear_notification_if_current(&mut state, generation);
        state.conversation.push(entry.clone());
        self.event_bus.emit(ClientEvent::ConversationAppended { entry });
    }

    /// Apply a delayed sequence snapshot. Replaces the whole sequence.
    pub(crate) fn reveal_sequence(&self, sequence: Vec<OutreachItem>, generation: u64) {
        let mut state = self.state.lock().unwrap();
        self.clear_notification_if_current(&mut state, generation);
        state.sequence = sequence.clone();
        self.event_bus.emit(ClientEvent::SequenceReplaced { sequence });
    }

    pub(crate) fn append_greeting(&self, text: &str) {
        let entry = ConversationEntry::assistant(text);
        let mut state = self.state.lock().unwrap();
        state.conversation.push(entry.clone());
        self.event_bus.emit(ClientEvent::ConversationAppended { entry });
    }

    fn clear_notification_if_current(&self, state: &mut StoreState, generation: u64) {
        if state.notification_generation != generation {
            log::debug!(
                "Keeping notification: generation {} superseded {}",
                state.notification_generation,
                generation
            );
            return;
        }
        if state.notification.take().is_some() {
            self.event_bus
                .emit(ClientEvent::NotificationChanged { text: None });
        }
    }
}
