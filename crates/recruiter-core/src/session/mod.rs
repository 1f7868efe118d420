//! Session identity and negotiation.
//!
//! A session is created by the server over HTTP and then joined over the
//! transport. The id is persisted so a restarted client resumes the same
//! conversation.

pub mod api;
mod negotiator;
mod state;

pub use api::{ApiError, HttpSessionApi, SessionApi};
pub use negotiator::{NegotiationError, RetryPolicy, SessionNegotiator};
pub use state::{Identity, SessionId};
