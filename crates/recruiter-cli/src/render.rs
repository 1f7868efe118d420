//! Plain-text rendering of client state for the terminal.

use recruiter_core::{ClientEvent, ConversationEntry, OutreachItem, Role};

/// One line (or block) for an incoming event, or `None` if nothing to show.
pub fn render_event(event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::StatusChanged { status } => Some(format!("[status] {status}")),
        ClientEvent::SessionJoined { session_id } => Some(format!("[session] {session_id}")),
        ClientEvent::NegotiationFailed { attempts, reason } => Some(format!(
            "[error] could not establish a session after {attempts} attempts: {reason}"
        )),
        ClientEvent::NotificationChanged { text } => text.as_ref().map(|t| format!("... {t}")),
        // The user already sees what they typed.
        ClientEvent::ConversationAppended { entry } if entry.role == Role::User => None,
        ClientEvent::ConversationAppended { entry } => Some(render_entry(entry)),
        ClientEvent::SequenceReplaced { sequence } => Some(render_sequence(sequence)),
        ClientEvent::SequenceItemEdited { id, .. } => Some(format!("[sequence] {id} updated")),
        ClientEvent::ServerError { message } => Some(format!("[server] {message}")),
    }
}

pub fn render_entry(entry: &ConversationEntry) -> String {
    match &entry.name {
        Some(name) => format!("{} ({name})> {}", entry.role, entry.content),
        None => format!("{}> {}", entry.role, entry.content),
    }
}

pub fn render_history(entries: &[ConversationEntry]) -> String {
    if entries.is_empty() {
        return "(no messages yet)".to_string();
    }
    entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_sequence(items: &[OutreachItem]) -> String {
    if items.is_empty() {
        return "(no outreach sequence yet)".to_string();
    }

    let mut out = String::from("Outreach sequence:");
    for item in items {
        out.push_str(&format!(
            "\n  {}. [{}] {} ({}, {})",
            item.order, item.id, item.subject, item.kind, item.timing
        ));
        for line in item.content.lines() {
            out.push_str("\n     ");
            out.push_str(line);
        }
    }
    out
}
