//! # recruiter-core
//!
//! Session and event synchronization for the recruiting assistant client.
//!
//! This crate is framework-agnostic: a front end builds a [`RecruiterClient`],
//! subscribes to its [`ClientEvent`]s and renders them.
//!
//! ## Key Concepts
//!
//! - **Session**: server-side conversation context, created over HTTP and
//!   joined over the transport
//! - **Reveal**: the delayed application of a result event to client state
//! - **Outreach sequence**: the ordered recruiting-message drafts under edit

pub mod client;
pub mod config;
pub mod connection;
pub mod event_bus;
pub mod logging;
pub mod persistence;
pub mod protocol;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::{ClientBuilder, ClientError, RecruiterClient};
pub use config::ClientConfig;
pub use event_bus::{ClientEvent, ConnectionStatus, EventBus};
pub use session::SessionId;
pub use store::StateStore;
pub use types::{ConversationEntry, OutreachItem, Role, UserProfile};
