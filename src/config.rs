//! Environment configuration

use std::time::Duration;
use thiserror::Error;

pub const SERVER_URL_VAR: &str = "RAGCHAT_SERVER_URL";
pub const USER_ID_VAR: &str = "RAGCHAT_USER_ID";
pub const REQUEST_TIMEOUT_VAR: &str = "RAGCHAT_REQUEST_TIMEOUT_SECS";
pub const STREAM_IDLE_TIMEOUT_VAR: &str = "RAGCHAT_STREAM_IDLE_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_VAR: &str = "RAGCHAT_CONNECT_TIMEOUT_SECS";

const DEFAULT_USER_ID: &str = "test";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has invalid value {value:?}: expected whole seconds")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for talking to the RAG service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, without trailing slash
    pub server_url: String,
    pub user_id: String,
    /// Timeout for the two request/response endpoints
    pub request_timeout: Duration,
    /// Longest allowed gap between two stream events
    pub stream_idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: normalize_url(&server_url.into()),
            user_id: DEFAULT_USER_ID.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_url = lookup(SERVER_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(SERVER_URL_VAR))?;

        let mut config = Self::new(server_url);
        if let Some(user_id) = lookup(USER_ID_VAR).filter(|id| !id.is_empty()) {
            config.user_id = user_id;
        }
        if let Some(timeout) = seconds(&lookup, REQUEST_TIMEOUT_VAR)? {
            config.request_timeout = timeout;
        }
        if let Some(timeout) = seconds(&lookup, STREAM_IDLE_TIMEOUT_VAR)? {
            config.stream_idle_timeout = timeout;
        }
        if let Some(timeout) = seconds(&lookup, CONNECT_TIMEOUT_VAR)? {
            config.connect_timeout = timeout;
        }
        Ok(config)
    }

    /// Full URL of an endpoint, e.g. `endpoint("stream")`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path.trim_start_matches('/'))
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or(ConfigError::Invalid { var, value }),
    }
}
