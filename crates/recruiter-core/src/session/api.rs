//! HTTP collaborators for session creation and user profiles.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::SessionId;
use crate::types::UserProfile;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Session service returned status {0}")]
    Status(u16),

    #[error("Session service unreachable: {0}")]
    Transport(String),

    #[error("Invalid response from session service: {0}")]
    Decode(String),
}

impl From<ureq::Error> for ApiError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => ApiError::Status(code),
            ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
        }
    }
}

/// The remote side of session negotiation.
///
/// Calls block; async callers run them on the blocking pool.
pub trait SessionApi: Send + Sync {
    /// `POST /api/session` - allocate a new session.
    fn create_session(&self) -> Result<SessionId, ApiError>;

    /// `POST /api/session/{id}/user` - attach a user profile, returning the user id.
    fn register_user(&self, session_id: &SessionId, profile: &UserProfile)
        -> Result<String, ApiError>;
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

pub struct HttpSessionApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSessionApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl SessionApi for HttpSessionApi {
    fn create_session(&self) -> Result<SessionId, ApiError> {
        let url = format!("{}/api/session", self.base_url);
        let response = self.agent.post(&url).call()?;

        let body: CreateSessionResponse = response
            .into_json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if body.session_id.is_empty() {
            return Err(ApiError::Decode("empty session_id".to_string()));
        }
        Ok(SessionId(body.session_id))
    }

    fn register_user(
        &self,
        session_id: &SessionId,
        profile: &UserProfile,
    ) -> Result<String, ApiError> {
        let url = format!("{}/api/session/{}/user", self.base_url, session_id);
        let response = self.agent.post(&url).send_json(profile)?;

        // The body is the bare identifier; tolerate a JSON string too.
        let text = response
            .into_string()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let text = text.trim();
        let user_id = serde_json::from_str::<String>(text).unwrap_or_else(|_| text.to_string());

        if user_id.is_empty() {
            return Err(ApiError::Decode("empty user id".to_string()));
        }
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpSessionApi::new("http://localhost:4000/", Duration::from_secs(1));
        assert_eq!(api.base_url(), "http://localhost:4000");
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let api = HttpSessionApi::new("http://127.0.0.1:1", Duration::from_secs(1));
        assert!(matches!(api.create_session(), Err(ApiError::Transport(_))));
    }

    #[test]
    fn error_messages() {
        assert!(ApiError::Status(503).to_string().contains("503"));
        assert!(ApiError::Decode("bad".to_string()).to_string().contains("bad"));
    }
}
