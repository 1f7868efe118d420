//! Session negotiation: resolve a session id, then join it.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::api::{ApiError, SessionApi};
use super::SessionId;
use crate::connection::ConnectionManager;
use crate::persistence::IdentityStore;
use crate::protocol::OutboundEvent;
use crate::transport::TransportError;

/// Bounded exponential backoff for failed session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Add up to 10% random delay on top of each backoff.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = base.as_millis() as u64 / 10;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("Session negotiation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: ApiError },

    #[error("Failed to join session: {0}")]
    Join(#[from] TransportError),

    #[error("Session negotiation cancelled")]
    Cancelled,
}

/// Resolves (reuses or creates) the session id and sends the join notice.
pub struct SessionNegotiator {
    api: Arc<dyn SessionApi>,
    identity: Arc<IdentityStore>,
    connection: Arc<ConnectionManager>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl SessionNegotiator {
    pub fn new(
        api: Arc<dyn SessionApi>,
        identity: Arc<IdentityStore>,
        connection: Arc<ConnectionManager>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            identity,
            connection,
            policy,
            cancel,
        }
    }

    /// Run one negotiation, called once per successful connection.
    ///
    /// A failed creation clears the cached session id and starts over, up to
    /// `max_attempts` times.
    pub async fn negotiate(&self) -> Result<SessionId, NegotiationError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let resolved = tokio::select! {
                _ = self.cancel.cancelled() => return Err(NegotiationError::Cancelled),
                resolved = self.resolve() => resolved,
            };

            match resolved {
                Ok(session_id) => {
                    if self.cancel.is_cancelled() {
                        return Err(NegotiationError::Cancelled);
                    }
                    self.connection.send(OutboundEvent::JoinSession {
                        session_id: session_id.clone(),
                    })?;
                    log::info!("Joined session {}", session_id);
                    return Ok(session_id);
                }
                Err(e) => {
                    log::warn!(
                        "Session negotiation attempt {}/{} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    self.identity.clear_session_id();

                    if attempt >= self.policy.max_attempts {
                        return Err(NegotiationError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.policy.backoff(attempt);
                    log::debug!("Retrying session negotiation in {:?}", delay);
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(NegotiationError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn resolve(&self) -> Result<SessionId, ApiError> {
        if let Some(existing) = self.identity.session_id() {
            log::debug!("Resuming session {}", existing);
            return Ok(existing);
        }

        let api = Arc::clone(&self.api);
        let created = tokio::task::spawn_blocking(move || api.create_session())
            .await
            .map_err(|e| ApiError::Transport(format!("session request aborted: {e}")))??;

        if let Err(e) = self.identity.set_session_id(Some(created.clone())) {
            log::warn!("Failed to persist session id {}: {}", created, e);
        }
        log::info!("Created session {}", created);
        Ok(created)
    }
}
