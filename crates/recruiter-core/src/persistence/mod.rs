//! Durable identity persistence.
//!
//! # Overview
//!
//! The client remembers two identifiers across restarts:
//!
//! - **session_id** - the server session to resume on the next connection
//! - **user_id** - set once the user has completed onboarding
//!
//! Both live behind a small key/value surface ([`KeyValueStore`]) whose values
//! are JSON-serialized strings. [`Persisted`] layers a typed, cached value on
//! top of one key, and [`IdentityStore`] binds the two identifiers.
//!
//! # File Layout
//!
//! With [`FileStore`] every key is its own file in the data directory:
//!
//! ```text
//! ~/.config/recruiter/
//! ├── session_id.json   # "\"3f0c...\""
//! └── user_id.json      # "null" until onboarding
//! ```
//!
//! # Design Principles
//!
//! ## Atomic Writes
//!
//! Saves write `key.json.tmp` and rename it over `key.json`.
//!
//! ## Forgiving Reads
//!
//! A missing or malformed value never errors on read; the caller-supplied
//! default is used instead and a warning is logged.

pub mod identity;
pub mod medium;
pub mod persisted;

pub use identity::{IdentityStore, SESSION_ID_KEY, USER_ID_KEY};
pub use medium::{FileStore, KeyValueStore, MemoryStore};
pub use persisted::Persisted;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}
