//! WebSocket transport carrying JSON event frames.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::{SignalReceiver, Transport, TransportError, TransportSignal};
use crate::logging::{self, log_line, LogHandle};
use crate::protocol::{decode_inbound, encode_outbound, OutboundEvent};

enum Command {
    Send(OutboundEvent),
    Close,
}

enum State {
    Idle,
    Open(mpsc::UnboundedSender<Command>),
    Closed,
}

/// A single WebSocket connection driven by a background task.
///
/// Outbound events and the close request share one ordered queue. Events
/// queued before the socket is up are delivered once it connects. There is no
/// reconnection: a dropped socket ends in `Disconnected`.
pub struct WebSocketTransport {
    url: String,
    wire_log: LogHandle,
    state: Mutex<State>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wire_log: logging::disabled(),
            state: Mutex::new(State::Idle),
        }
    }

    /// Trace every frame to the given log.
    pub fn with_wire_log(mut self, handle: LogHandle) -> Self {
        self.wire_log = handle;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    /// Must be called from within a tokio runtime.
    fn open(&self) -> Result<SignalReceiver, TransportError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Idle => {}
            State::Open(_) => return Err(TransportError::AlreadyOpen),
            State::Closed => return Err(TransportError::Closed),
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_connection(
            self.url.clone(),
            Arc::clone(&self.wire_log),
            command_rx,
            signal_tx,
        ));

        *state = State::Open(command_tx);
        Ok(signal_rx)
    }

    fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        match &*self.state.lock().unwrap() {
            State::Open(commands) => commands
                .send(Command::Send(event))
                .map_err(|_| TransportError::Closed),
            State::Idle => Err(TransportError::NotOpen),
            State::Closed => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().unwrap(), State::Closed);
        if let State::Open(commands) = previous {
            let _ = commands.send(Command::Close);
        }
    }
}

async fn run_connection(
    url: String,
    wire_log: LogHandle,
    mut commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedSender<TransportSignal>,
) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            log::warn!("WebSocket connection to {} failed: {}", url, e);
            let _ = signals.send(TransportSignal::Disconnected {
                reason: e.to_string(),
            });
            return;
        }
    };

    log::debug!("WebSocket connected to {}", url);
    let _ = signals.send(TransportSignal::Connected);

    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(event)) => {
                    let frame = match encode_outbound(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            log::warn!("Dropping {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    log_line(&wire_log, "SEND", &frame);
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        break e.to_string();
                    }
                }
                Some(Command::Close) | None => {
                    let _ = write.close().await;
                    log::debug!("WebSocket closed by client");
                    break "closed by client".to_string();
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    log_line(&wire_log, "RECV", &text);
                    match decode_inbound(&text) {
                        Ok(event) => {
                            let _ = signals.send(TransportSignal::Event(event));
                        }
                        Err(e) => log::warn!("Skipping unrecognized frame: {}", e),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "connection closed".to_string(),
            },
        }
    };

    let _ = signals.send(TransportSignal::Disconnected { reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_before_open_fails() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/ws");
        let result = transport.send(OutboundEvent::LeaveSession { session_id: None });
        assert_eq!(result, Err(TransportError::NotOpen));
    }

    #[test]
    fn open_outside_runtime_fails() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/ws");
        assert!(matches!(transport.open(), Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn open_twice_fails() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/ws");
        let _signals = transport.open().unwrap();
        assert!(matches!(transport.open(), Err(TransportError::AlreadyOpen)));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/ws");
        let _signals = transport.open().unwrap();
        transport.close();
        transport.close();

        let result = transport.send(OutboundEvent::LeaveSession { session_id: None });
        assert_eq!(result, Err(TransportError::Closed));
        assert!(matches!(transport.open(), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn unreachable_server_reports_disconnect() {
        // Port 1 is never listening in the test environment.
        let transport = WebSocketTransport::new("ws://127.0.0.1:1/ws");
        let mut signals = transport.open().unwrap();

        match signals.recv().await {
            Some(TransportSignal::Disconnected { .. }) => {}
            other => panic!("expected disconnect, got {:?}", other),
        }
    }
}
