//! Real-time transport to the assistant service.
//!
//! A [`Transport`] is the one connection the client holds. It is owned by the
//! [`ConnectionManager`](crate::connection::ConnectionManager); other
//! components reach it only through the manager.
//!
//! ```text
//!   open() ──► receiver of TransportSignal
//!                 Connected │ Event(InboundEvent) │ Disconnected
//!   send(OutboundEvent)  ──► queued in order
//!   close()              ──► after everything already queued
//! ```

pub mod memory;
pub mod websocket;

pub use memory::{MemoryTransport, TransportRecord};
pub use websocket::WebSocketTransport;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::{InboundEvent, OutboundEvent};

/// What the transport reports back after `open()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The connection is established (may repeat after a reconnect).
    Connected,
    /// A server-pushed event, in arrival order.
    Event(InboundEvent),
    /// The connection dropped or could not be established.
    Disconnected { reason: String },
}

pub type SignalReceiver = mpsc::UnboundedReceiver<TransportSignal>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport has not been opened")]
    NotOpen,

    #[error("Transport is already open")]
    AlreadyOpen,

    #[error("Transport is closed")]
    Closed,

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to encode event: {0}")]
    Encode(String),
}

/// A bidirectional event channel.
///
/// All methods are non-blocking: sends and the close request are queued and
/// processed in order, so a `send` followed by `close` always delivers the
/// send first.
pub trait Transport: Send + Sync {
    /// Create the connection handle and start connecting.
    ///
    /// May only be called once per transport.
    fn open(&self) -> Result<SignalReceiver, TransportError>;

    /// Queue an outbound event.
    fn send(&self, event: OutboundEvent) -> Result<(), TransportError>;

    /// Terminate the connection after flushing queued events. Idempotent.
    fn close(&self);
}
