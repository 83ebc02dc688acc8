use std::fmt;

use async_trait::async_trait;

use super::types::{ArtifactPayload, SendReply, SendRequest, SessionRecord};
use crate::core::types::SessionSummary;

/// Errors that can occur talking to the backend.
#[derive(Debug)]
pub enum BackendError {
    /// Client misconfigured (bad URL, TLS setup). Not retryable.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// Backend answered with a non-success status.
    Api { status: u16, message: String },
    /// Response body did not match the expected shape.
    Parse(String),
    /// The session id is unknown to the backend.
    NotFound(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Config(msg) => write!(f, "config error: {msg}"),
            BackendError::Network(msg) => write!(f, "network error: {msg}"),
            BackendError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            BackendError::Parse(msg) => write!(f, "parse error: {msg}"),
            BackendError::NotFound(id) => write!(f, "session not found: {id}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Request/response contract of the remote session backend.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Returns the name of the backend, for logs.
    fn name(&self) -> &str;

    /// Sends one user message; the backend creates a session when
    /// `request.session_id` is absent.
    async fn send_message(&self, request: &SendRequest) -> Result<SendReply, BackendError>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError>;

    async fn get_session(&self, id: &str) -> Result<SessionRecord, BackendError>;

    /// Creates an empty session and returns its id.
    async fn create_session(&self, name: Option<&str>) -> Result<String, BackendError>;

    async fn delete_session(&self, id: &str) -> Result<(), BackendError>;

    async fn delete_all_sessions(&self) -> Result<(), BackendError>;

    /// Current artifact contents stored for a session.
    async fn fetch_artifacts(&self, id: &str) -> Result<Vec<ArtifactPayload>, BackendError>;

    /// True when the backend answers its health endpoint.
    async fn health_check(&self) -> bool;
}
