//! Client configuration.
//!
//! Stored as `config.json` in the config directory. Every field has a default,
//! so a missing file or a partial file is fine:
//!
//! ```json
//! {
//!   "serverUrl": "http://localhost:4000",
//!   "wsPath": "/ws",
//!   "revealDelayMs": 2000,
//!   "negotiation": { "maxAttempts": 5, "initialBackoffMs": 500 }
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::session::RetryPolicy;

pub const CONFIG_FILE: &str = "config.json";

const DEFAULT_GREETING: &str = "Hi! I'm your recruiting assistant. Tell me about the role you're hiring for and I'll draft an outreach sequence you can edit.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Home directory not set (HOME / USERPROFILE)")]
    NoHomeDir,
}

/// Retry settings for session negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NegotiationConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL of the assistant service (HTTP API and WebSocket).
    pub server_url: String,
    /// WebSocket endpoint path on the server.
    pub ws_path: String,
    /// How long result events stay hidden after they arrive.
    pub reveal_delay_ms: u64,
    /// Assistant entry appended on every successful connection.
    pub greeting: String,
    pub request_timeout_secs: u64,
    /// Directory for wire trace logs; tracing is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
    pub negotiation: NegotiationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4000".to_string(),
            ws_path: "/ws".to_string(),
            reveal_delay_ms: 2_000,
            greeting: DEFAULT_GREETING.to_string(),
            request_timeout_secs: 10,
            log_dir: None,
            negotiation: NegotiationConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.negotiation.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.negotiation.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.negotiation.max_backoff_ms),
            jitter: self.negotiation.jitter,
        }
    }

    /// The WebSocket URL derived from `server_url` and `ws_path`.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`. `server_url` also backs
    /// the HTTP API, so any other scheme (including `ws`/`wss`) is rejected.
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(invalid(format!("unsupported scheme {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot use scheme {scheme}")))?;
        url.set_path(&self.ws_path);
        Ok(url.to_string())
    }
}

/// `~/.config/recruiter`. The home directory is `HOME`, or `USERPROFILE` on
/// Windows.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("recruiter"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Load `config.json` from `dir`, falling back to defaults when it is missing.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save `config.json` atomically (write temp file, then rename).
pub fn save_config(dir: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    fs::create_dir_all(dir)?;

    let path = dir.join(CONFIG_FILE);
    let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));

    fs::write(&temp_path, serde_json::to_string_pretty(config)?)?;
    fs::rename(&temp_path, &path)?;

    Ok(())
}
