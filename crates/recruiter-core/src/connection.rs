//! Connection lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::persistence::IdentityStore;
use crate::protocol::OutboundEvent;
use crate::transport::{SignalReceiver, Transport, TransportError};

/// Sole owner of the client's transport.
///
/// Teardown is symmetric and happens exactly once: `close()` (called
/// explicitly, by client shutdown, or from `Drop`) sends a `leave_session`
/// notice with the session id known at that moment, then closes the transport.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    identity: Arc<IdentityStore>,
    closed: AtomicBool,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, identity: Arc<IdentityStore>) -> Self {
        Self {
            transport,
            identity,
            closed: AtomicBool::new(false),
        }
    }

    /// Create the transport handle and start connecting.
    pub fn open(&self) -> Result<SignalReceiver, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        log::debug!("Opening transport");
        self.transport.open()
    }

    pub fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        log::debug!("Sending {}", event.name());
        self.transport.send(event)
    }

    /// Leave the current session and close the transport. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let session_id = self.identity.session_id();
        match &session_id {
            Some(id) => log::info!("Leaving session {}", id),
            None => log::info!("Leaving without a session"),
        }

        if let Err(e) = self.transport.send(OutboundEvent::LeaveSession { session_id }) {
            log::debug!("Leave notice not delivered: {}", e);
        }
        self.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::session::SessionId;
    use crate::transport::{MemoryTransport, TransportRecord};

    fn setup() -> (Arc<MemoryTransport>, Arc<IdentityStore>, ConnectionManager) {
        let transport = Arc::new(MemoryTransport::new());
        let identity = Arc::new(IdentityStore::new(Arc::new(MemoryStore::new())));
        let manager = ConnectionManager::new(transport.clone(), Arc::clone(&identity));
        (transport, identity, manager)
    }

    #[test]
    fn close_sends_leave_before_closing() {
        let (transport, identity, manager) = setup();
        let _signals = manager.open().unwrap();
        identity.set_session_id(Some(SessionId::from("sess-1"))).unwrap();

        manager.close();

        assert_eq!(
            transport.records(),
            vec![
                TransportRecord::Opened,
                TransportRecord::Sent(OutboundEvent::LeaveSession {
                    session_id: Some(SessionId::from("sess-1"))
                }),
                TransportRecord::Closed,
            ]
        );
    }

    #[test]
    fn close_without_session_sends_null_leave() {
        let (transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();

        manager.close();

        assert_eq!(
            transport.sent(),
            vec![OutboundEvent::LeaveSession { session_id: None }]
        );
        assert!(transport.is_closed());
    }

    #[test]
    fn close_is_idempotent() {
        let (transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();

        manager.close();
        manager.close();

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(
            transport
                .records()
                .iter()
                .filter(|r| **r == TransportRecord::Closed)
                .count(),
            1
        );
    }

    #[test]
    fn drop_tears_down() {
        let (transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();

        drop(manager);

        assert_eq!(
            transport.records().last(),
            Some(&TransportRecord::Closed)
        );
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn drop_after_close_does_not_repeat() {
        let (transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();
        manager.close();
        drop(manager);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn leave_uses_session_known_at_close_time() {
        let (transport, identity, manager) = setup();
        identity.set_session_id(Some(SessionId::from("old"))).unwrap();
        let _signals = manager.open().unwrap();
        identity.set_session_id(Some(SessionId::from("new"))).unwrap();

        manager.close();

        assert_eq!(
            transport.sent(),
            vec![OutboundEvent::LeaveSession {
                session_id: Some(SessionId::from("new"))
            }]
        );
    }

    #[test]
    fn send_and_open_fail_after_close() {
        let (_transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();
        manager.close();

        assert_eq!(
            manager.send(OutboundEvent::LeaveSession { session_id: None }),
            Err(TransportError::Closed)
        );
        assert!(matches!(manager.open(), Err(TransportError::Closed)));
    }

    #[test]
    fn open_twice_is_rejected() {
        let (_transport, _identity, manager) = setup();
        let _signals = manager.open().unwrap();
        assert!(matches!(manager.open(), Err(TransportError::AlreadyOpen)));
    }
}
