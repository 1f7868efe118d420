//! In-process transport for tests and offline front ends.
//!
//! The "remote side" is driven by hand: call [`MemoryTransport::connect`],
//! [`MemoryTransport::deliver`] or [`MemoryTransport::drop_connection`] to push
//! signals, and inspect what the client sent with [`MemoryTransport::records`].

use std::sync::Mutex;

use tokio::sync::{mpsc, Notify};

use super::{SignalReceiver, Transport, TransportError, TransportSignal};
use crate::protocol::{InboundEvent, OutboundEvent};

/// One observable action taken on the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRecord {
    Opened,
    Sent(OutboundEvent),
    Closed,
}

#[derive(Default)]
struct Inner {
    signals: Option<mpsc::UnboundedSender<TransportSignal>>,
    opened: bool,
    closed: bool,
    records: Vec<TransportRecord>,
}

#[derive(Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a (re)established connection.
    pub fn connect(&self) {
        self.signal(TransportSignal::Connected);
    }

    /// Push a server event.
    pub fn deliver(&self, event: InboundEvent) {
        self.signal(TransportSignal::Event(event));
    }

    /// Report a dropped connection.
    pub fn drop_connection(&self, reason: &str) {
        self.signal(TransportSignal::Disconnected {
            reason: reason.to_string(),
        });
    }

    fn signal(&self, signal: TransportSignal) {
        let inner = self.inner.lock().unwrap();
        match &inner.signals {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => log::debug!("Ignoring {:?} on unopened memory transport", signal),
        }
    }

    pub fn records(&self) -> Vec<TransportRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    /// Outbound events only, in send order.
    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter_map(|record| match record {
                TransportRecord::Sent(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Wait until at least `count` events have been sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<OutboundEvent> {
        loop {
            let notified = self.changed.notified();
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            notified.await;
        }
    }

    fn record(&self, inner: &mut Inner, record: TransportRecord) {
        inner.records.push(record);
        self.changed.notify_waiters();
    }
}

impl Transport for MemoryTransport {
    fn open(&self) -> Result<SignalReceiver, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if inner.opened {
            return Err(TransportError::AlreadyOpen);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.signals = Some(tx);
        inner.opened = true;
        self.record(&mut inner, TransportRecord::Opened);
        Ok(rx)
    }

    fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if !inner.opened {
            return Err(TransportError::NotOpen);
        }
        self.record(&mut inner, TransportRecord::Sent(event));
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.signals = None;
        self.record(&mut inner, TransportRecord::Closed);
    }
}
