//! The assembled client.
//!
//! [`ClientBuilder`] constructs every component once and injects them into
//! each other. [`RecruiterClient::start`] opens the transport and spawns the
//! driver task, which consumes transport signals in arrival order:
//!
//! - `Connected`: start a negotiation, then append the greeting
//! - `Event`: hand to the [`EventReconciler`]
//! - `Disconnected`: record the status
//!
//! [`RecruiterClient::shutdown`] (or dropping the client) cancels pending
//! work and tears the connection down with a leave notice.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{ClientConfig, ConfigError};
use crate::connection::ConnectionManager;
use crate::event_bus::{ClientEvent, ConnectionStatus, EventBus};
use crate::logging::open_log_file;
use crate::persistence::{FileStore, IdentityStore, KeyValueStore, MemoryStore, PersistenceError};
use crate::reconciler::EventReconciler;
use crate::session::{
    ApiError, HttpSessionApi, NegotiationError, RetryPolicy, SessionApi, SessionNegotiator,
};
use crate::store::{StateStore, StoreError};
use crate::transport::{SignalReceiver, Transport, TransportError, TransportSignal, WebSocketTransport};
use crate::types::UserProfile;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("No session has been established yet")]
    NoSession,

    #[error("Client is already started")]
    AlreadyStarted,

    #[error("Client has been shut down")]
    ShutDown,

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Current connection status, broadcast on every change.
struct StatusCell {
    status: Mutex<ConnectionStatus>,
    event_bus: Arc<EventBus>,
}

impl StatusCell {
    fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            status: Mutex::new(ConnectionStatus::Idle),
            event_bus,
        }
    }

    fn get(&self) -> ConnectionStatus {
        *self.status.lock().unwrap()
    }

    fn set(&self, status: ConnectionStatus) {
        let mut current = self.status.lock().unwrap();
        if *current == status {
            return;
        }
        log::debug!("Connection status {} -> {}", *current, status);
        *current = status;
        self.event_bus.emit(ClientEvent::StatusChanged { status });
    }
}

/// Builds a [`RecruiterClient`].
///
/// Every collaborator has a default derived from the [`ClientConfig`]:
/// a [`WebSocketTransport`] at [`ClientConfig::ws_url`], an [`HttpSessionApi`]
/// at `server_url`, and identity persisted in `data_dir` (in memory when no
/// data directory is set).
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    session_api: Option<Arc<dyn SessionApi>>,
    identity_medium: Option<Arc<dyn KeyValueStore>>,
    data_dir: Option<PathBuf>,
    event_bus: Option<Arc<EventBus>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session_api(mut self, api: Arc<dyn SessionApi>) -> Self {
        self.session_api = Some(api);
        self
    }

    pub fn identity_medium(mut self, medium: Arc<dyn KeyValueStore>) -> Self {
        self.identity_medium = Some(medium);
        self
    }

    /// Persist identity as files in `dir`.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<RecruiterClient, ClientError> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let log_id = format!("recruiter-{}", Utc::now().format("%Y%m%d-%H%M%S"));
                let wire_log = open_log_file(config.log_dir.as_deref(), &log_id);
                Arc::new(WebSocketTransport::new(config.ws_url()?).with_wire_log(wire_log))
            }
        };

        let session_api: Arc<dyn SessionApi> = match self.session_api {
            Some(api) => api,
            None => {
                config.ws_url()?;
                Arc::new(HttpSessionApi::new(&config.server_url, config.request_timeout()))
            }
        };

        let medium: Arc<dyn KeyValueStore> = match (self.identity_medium, self.data_dir) {
            (Some(medium), _) => medium,
            (None, Some(dir)) => Arc::new(FileStore::new(dir)),
            (None, None) => {
                log::debug!("No data directory; identity will not survive restarts");
                Arc::new(MemoryStore::new())
            }
        };

        let event_bus = self.event_bus.unwrap_or_default();
        let identity = Arc::new(IdentityStore::new(medium));
        let connection = Arc::new(ConnectionManager::new(transport, Arc::clone(&identity)));
        let store = Arc::new(StateStore::new(
            Arc::clone(&connection),
            Arc::clone(&identity),
            Arc::clone(&event_bus),
        ));

        let cancel = CancellationToken::new();
        let reconciler = Arc::new(EventReconciler::new(
            Arc::clone(&store),
            Arc::clone(&event_bus),
            config.reveal_delay(),
            cancel.child_token(),
        ));

        Ok(RecruiterClient {
            status: Arc::new(StatusCell::new(Arc::clone(&event_bus))),
            config,
            identity,
            connection,
            store,
            reconciler,
            session_api,
            event_bus,
            cancel,
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
        })
    }
}

pub struct RecruiterClient {
    config: ClientConfig,
    identity: Arc<IdentityStore>,
    connection: Arc<ConnectionManager>,
    store: Arc<StateStore>,
    reconciler: Arc<EventReconciler>,
    session_api: Arc<dyn SessionApi>,
    event_bus: Arc<EventBus>,
    status: Arc<StatusCell>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    started: AtomicBool,
}

impl RecruiterClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Open the transport and start processing its signals.
    ///
    /// Must be called from within a tokio runtime, and only once.
    pub fn start(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() || self.connection.is_closed() {
            return Err(ClientError::ShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }

        self.status.set(ConnectionStatus::Connecting);
        let signals = match self.connection.open() {
            Ok(signals) => signals,
            Err(e) => {
                self.status.set(ConnectionStatus::Disconnected);
                return Err(e.into());
            }
        };

        let driver = Driver {
            signals,
            api: Arc::clone(&self.session_api),
            identity: Arc::clone(&self.identity),
            connection: Arc::clone(&self.connection),
            store: Arc::clone(&self.store),
            reconciler: Arc::clone(&self.reconciler),
            event_bus: Arc::clone(&self.event_bus),
            status: Arc::clone(&self.status),
            policy: self.config.retry_policy(),
            greeting: self.config.greeting.clone(),
            cancel: self.cancel.clone(),
            tasks: self.tasks.clone(),
            negotiation: None,
        };
        self.tasks.spawn(driver.run());

        log::debug!("Client started");
        Ok(())
    }

    /// Cancel pending work, leave the session and close the transport.
    ///
    /// Returns once no background task can still touch client state.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.reconciler.shutdown().await;
        self.connection.close();

        self.tasks.close();
        self.tasks.wait().await;

        self.status.set(ConnectionStatus::Closed);
        log::debug!("Client shut down");
    }

    /// Send a chat message as the user. `Ok(false)` when `text` is blank.
    pub fn send_message(&self, text: &str) -> Result<bool, ClientError> {
        Ok(self.store.append_user_message(text)?)
    }

    /// Edit one outreach item. `Ok(false)` when `content` is blank.
    pub fn edit_sequence_item(&self, id: &str, content: &str) -> Result<bool, ClientError> {
        Ok(self.store.edit_sequence_item(id, content)?)
    }

    /// Submit the onboarding profile and remember the returned user id.
    pub async fn register_user(&self, profile: UserProfile) -> Result<String, ClientError> {
        let session_id = self.identity.session_id().ok_or(ClientError::NoSession)?;

        let api = Arc::clone(&self.session_api);
        let user_id = tokio::task::spawn_blocking(move || api.register_user(&session_id, &profile))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))??;

        self.identity.set_user_id(Some(user_id.clone()))?;
        log::info!("Registered user {}", user_id);
        Ok(user_id)
    }

    /// True until a user profile has been registered.
    pub fn needs_onboarding(&self) -> bool {
        self.identity.user_id().is_none()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_bus.subscribe()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for RecruiterClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.connection.close();
    }
}

/// Consumes transport signals for one client.
struct Driver {
    signals: SignalReceiver,
    api: Arc<dyn SessionApi>,
    identity: Arc<IdentityStore>,
    connection: Arc<ConnectionManager>,
    store: Arc<StateStore>,
    reconciler: Arc<EventReconciler>,
    event_bus: Arc<EventBus>,
    status: Arc<StatusCell>,
    policy: RetryPolicy,
    greeting: String,
    cancel: CancellationToken,
    tasks: TaskTracker,
    /// Cancels the negotiation started by the previous connection.
    negotiation: Option<CancellationToken>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let signal = tokio::select! {
                _ = self.cancel.cancelled() => break,
                signal = self.signals.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };

            match signal {
                TransportSignal::Connected => {
                    log::info!("Connected");
                    self.status.set(ConnectionStatus::Connected);
                    self.start_negotiation();
                    self.store.append_greeting(&self.greeting);
                }
                TransportSignal::Event(event) => {
                    log::debug!("Received {}", event.name());
                    self.reconciler.apply(event);
                }
                TransportSignal::Disconnected { reason } => {
                    log::warn!("Disconnected: {}", reason);
                    if let Some(previous) = self.negotiation.take() {
                        previous.cancel();
                    }
                    self.status.set(ConnectionStatus::Disconnected);
                }
            }
        }
        log::debug!("Driver stopped");
    }

    fn start_negotiation(&mut self) {
        if let Some(previous) = self.negotiation.take() {
            previous.cancel();
        }
        let token = self.cancel.child_token();
        self.negotiation = Some(token.clone());

        let negotiator = SessionNegotiator::new(
            Arc::clone(&self.api),
            Arc::clone(&self.identity),
            Arc::clone(&self.connection),
            self.policy.clone(),
            token,
        );
        let status = Arc::clone(&self.status);
        let event_bus = Arc::clone(&self.event_bus);

        self.tasks.spawn(async move {
            match negotiator.negotiate().await {
                Ok(session_id) => {
                    status.set(ConnectionStatus::Joined);
                    event_bus.emit(ClientEvent::SessionJoined { session_id });
                }
                Err(NegotiationError::Cancelled) => {
                    log::debug!("Negotiation cancelled");
                }
                Err(NegotiationError::Exhausted {
                    attempts,
                    last_error,
                }) => {
                    log::error!(
                        "Giving up on session negotiation after {} attempts: {}",
                        attempts,
                        last_error
                    );
                    event_bus.emit(ClientEvent::NegotiationFailed {
                        attempts,
                        reason: last_error.to_string(),
                    });
                    status.set(ConnectionStatus::NegotiationFailed);
                }
                Err(e @ NegotiationError::Join(_)) => {
                    log::warn!("{}", e);
                    status.set(ConnectionStatus::Disconnected);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use crate::transport::MemoryTransport;

    struct FixedApi;

    impl SessionApi for FixedApi {
        fn create_session(&self) -> Result<SessionId, ApiError> {
            Ok(SessionId::from("sess-fixed"))
        }

        fn register_user(&self, session_id: &SessionId, profile: &UserProfile) -> Result<String, ApiError> {
            Ok(format!("{}-{}", session_id, profile.name.to_lowercase()))
        }
    }

    fn client() -> (Arc<MemoryTransport>, RecruiterClient) {
        let transport = Arc::new(MemoryTransport::new());
        let client = ClientBuilder::new(ClientConfig::default())
            .transport(transport.clone())
            .session_api(Arc::new(FixedApi))
            .build()
            .unwrap();
        (transport, client)
    }

    mod builder {
        use super::*;

        #[test]
        fn rejects_bad_server_url_for_default_transport() {
            let config = ClientConfig {
                server_url: "ftp://example.com".to_string(),
                ..ClientConfig::default()
            };
            let result = ClientBuilder::new(config).build();
            assert!(matches!(result, Err(ClientError::Config(ConfigError::InvalidUrl { .. }))));
        }

        #[test]
        fn rejects_websocket_server_url_for_default_session_api() {
            let config = ClientConfig {
                server_url: "ws://localhost:4000".to_string(),
                ..ClientConfig::default()
            };
            let result = ClientBuilder::new(config)
                .transport(Arc::new(MemoryTransport::new()))
                .build();
            assert!(matches!(result, Err(ClientError::Config(ConfigError::InvalidUrl { .. }))));
        }

        #[test]
        fn data_dir_persists_identity() {
            let dir = tempfile::tempdir().unwrap();
            {
                let client = ClientBuilder::new(ClientConfig::default())
                    .transport(Arc::new(MemoryTransport::new()))
                    .data_dir(dir.path())
                    .build()
                    .unwrap();
                client
                    .identity()
                    .set_session_id(Some(SessionId::from("sess-disk")))
                    .unwrap();
            }

            let client = ClientBuilder::new(ClientConfig::default())
                .transport(Arc::new(MemoryTransport::new()))
                .data_dir(dir.path())
                .build()
                .unwrap();
            assert_eq!(
                client.identity().session_id(),
                Some(SessionId::from("sess-disk"))
            );
        }

        #[test]
        fn starts_idle() {
            let (_transport, client) = client();
            assert_eq!(client.status(), ConnectionStatus::Idle);
            assert!(client.needs_onboarding());
        }
    }

    mod lifecycle {
        use super::*;

        #[tokio::test]
        async fn start_twice_is_rejected() {
            let (_transport, client) = client();
            client.start().unwrap();
            assert!(matches!(client.start(), Err(ClientError::AlreadyStarted)));
            client.shutdown().await;
        }

        #[tokio::test]
        async fn start_after_shutdown_is_rejected() {
            let (_transport, client) = client();
            client.shutdown().await;
            assert!(matches!(client.start(), Err(ClientError::ShutDown)));
            assert_eq!(client.status(), ConnectionStatus::Closed);
        }

        #[tokio::test]
        async fn drop_sends_leave() {
            let (transport, client) = client();
            client.start().unwrap();
            drop(client);

            assert_eq!(
                transport.sent(),
                vec![crate::protocol::OutboundEvent::LeaveSession { session_id: None }]
            );
            assert!(transport.is_closed());
        }
    }

    mod register_user {
        use super::*;

        #[tokio::test]
        async fn requires_session() {
            let (_transport, client) = client();
            let result = client
                .register_user(UserProfile {
                    name: "Ada".to_string(),
                    ..UserProfile::default()
                })
                .await;
            assert!(matches!(result, Err(ClientError::NoSession)));
        }

        #[tokio::test]
        async fn stores_user_id() {
            let (_transport, client) = client();
            client
                .identity()
                .set_session_id(Some(SessionId::from("s1")))
                .unwrap();

            let user_id = client
                .register_user(UserProfile {
                    name: "Ada".to_string(),
                    company: Some("Analytical Engines".to_string()),
                    additional_context: None,
                })
                .await
                .unwrap();

            assert_eq!(user_id, "s1-ada");
            assert_eq!(client.identity().user_id().as_deref(), Some("s1-ada"));
            assert!(!client.needs_onboarding());
        }
    }
}
