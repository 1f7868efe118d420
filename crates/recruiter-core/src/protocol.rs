//! Wire events exchanged over the transport.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;
use crate::types::{OutreachItem, Role};

/// Events the client sends.
///
/// Everything except `LeaveSession` carries a non-optional session id, so a
/// session-scoped event cannot be built before a session exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    JoinSession {
        session_id: SessionId,
    },
    /// Sent on teardown with whatever session id is known, including none.
    LeaveSession {
        session_id: Option<SessionId>,
    },
    ChatMessage {
        session_id: SessionId,
        message: String,
    },
    UpdateSequence {
        session_id: SessionId,
        msg_id: String,
        content: String,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinSession { .. } => "join_session",
            OutboundEvent::LeaveSession { .. } => "leave_session",
            OutboundEvent::ChatMessage { .. } => "chat_message",
            OutboundEvent::UpdateSequence { .. } => "update_sequence",
        }
    }
}

/// Events pushed by the server.
///
/// Unknown payload fields (the server echoes `session_id`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The agent started a tool; `message` is a user-friendly description.
    ToolCall { message: String },
    /// A finished chat reply.
    ChatMessage { role: Role, message: String },
    /// Full snapshot of the outreach sequence.
    SequenceUpdated { sequence: Vec<OutreachItem> },
    /// The server rejected a request.
    Error { message: String },
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ToolCall { .. } => "tool_call",
            InboundEvent::ChatMessage { .. } => "chat_message",
            InboundEvent::SequenceUpdated { .. } => "sequence_updated",
            InboundEvent::Error { .. } => "error",
        }
    }
}

/// Parse one text frame from the server.
pub fn decode_inbound(frame: &str) -> Result<InboundEvent, serde_json::Error> {
    serde_json::from_str(frame)
}

/// Serialize one outbound event as a text frame.
pub fn encode_outbound(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
