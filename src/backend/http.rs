//! HTTP implementation of `BackendClient` over the backend's JSON API.
//!
//! Endpoints (all relative to the configured base URL):
//! - `POST   /api/chat_builder_agent`   send a message
//! - `GET    /api/chat_history`         list sessions
//! - `GET    /api/chat_session/{id}`    full session
//! - `POST   /api/chat_sessions`        create session
//! - `DELETE /api/chat_sessions/{id}`   delete session
//! - `DELETE /api/delete_all_chats`     delete everything
//! - `GET    /api/get_yamls/{id}`       artifact contents
//! - `GET    /api/health`               liveness

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use super::client::{BackendClient, BackendError};
use super::types::{
    ArtifactPayload, SendReply, SendRequest, SessionCreated, SessionListing, SessionRecord,
};
use crate::core::types::SessionSummary;

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/{segments..}/{id}` with `id` percent-encoded as one segment,
    /// so ids containing `/`, `?` or `#` cannot reach another endpoint.
    fn session_url(&self, segments: &[&str], id: &str) -> Result<reqwest::Url, BackendError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| BackendError::Config(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Config(format!("base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments)
            .push(id);
        Ok(url)
    }

    /// Turns transport errors and non-success statuses into `BackendError`.
    /// A 404 becomes `NotFound(id)` when the request addressed a session.
    async fn check(
        result: Result<reqwest::Response, reqwest::Error>,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, BackendError> {
        let response = result.map_err(|e| {
            warn!("Backend unreachable: {}", e);
            BackendError::Network(e.to_string())
        })?;

        let status = response.status();
        debug!("Backend response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::NOT_FOUND
            && let Some(id) = session_id
        {
            return Err(BackendError::NotFound(id.to_string()));
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Backend API error: {} - {}", status.as_u16(), message);
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("Unexpected backend payload: {}", e);
            BackendError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_message(&self, request: &SendRequest) -> Result<SendReply, BackendError> {
        info!(
            "POST /api/chat_builder_agent: session={}, content_len={}",
            request.session_id.as_deref().unwrap_or("<new>"),
            request.content.len()
        );

        let mut builder = self.client.post(self.url("/api/chat_builder_agent")).json(request);
        // The backend reads the session id from the query string, not the body.
        if let Some(id) = &request.session_id {
            builder = builder.query(&[("chat_id", id)]);
        }

        let response = Self::check(builder.send().await, None).await?;
        Self::read_json(response).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        info!("GET /api/chat_history");
        let response = Self::check(self.client.get(self.url("/api/chat_history")).send().await, None).await?;
        let listings: Vec<SessionListing> = Self::read_json(response).await?;
        Ok(listings.into_iter().map(SessionSummary::from).collect())
    }

    async fn get_session(&self, id: &str) -> Result<SessionRecord, BackendError> {
        info!("GET /api/chat_session/{}", id);
        let url = self.session_url(&["api", "chat_session"], id)?;
        let response = Self::check(self.client.get(url).send().await, Some(id)).await?;
        Self::read_json(response).await
    }

    async fn create_session(&self, name: Option<&str>) -> Result<String, BackendError> {
        info!("POST /api/chat_sessions: name={:?}", name);
        let mut builder = self
            .client
            .post(self.url("/api/chat_sessions"))
            .json(&serde_json::json!({ "name": name }));
        if let Some(name) = name {
            builder = builder.query(&[("name", name)]);
        }

        let response = Self::check(builder.send().await, None).await?;
        let created: SessionCreated = Self::read_json(response).await?;
        Ok(created.chat_id)
    }

    async fn delete_session(&self, id: &str) -> Result<(), BackendError> {
        info!("DELETE /api/chat_sessions/{}", id);
        let url = self.session_url(&["api", "chat_sessions"], id)?;
        Self::check(self.client.delete(url).send().await, Some(id)).await?;
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), BackendError> {
        info!("DELETE /api/delete_all_chats");
        Self::check(self.client.delete(self.url("/api/delete_all_chats")).send().await, None).await?;
        Ok(())
    }

    async fn fetch_artifacts(&self, id: &str) -> Result<Vec<ArtifactPayload>, BackendError> {
        info!("GET /api/get_yamls/{}", id);
        let url = self.session_url(&["api", "get_yamls"], id)?;
        let response = Self::check(self.client.get(url).send().await, Some(id)).await?;
        Self::read_json(response).await
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/api/health")).send().await {
            Ok(response) => {
                debug!("Health check status: {}", response.status());
                response.status().is_success()
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }
}
