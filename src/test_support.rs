//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::backend::types::{MessageRecord, WireId};
use crate::backend::{
    ArtifactPayload, BackendClient, BackendError, SendReply, SendRequest, SessionRecord,
};
use crate::core::artifact::ArtifactCatalog;
use crate::core::dispatcher::MessageDispatcher;
use crate::core::fallback::FallbackResponder;
use crate::core::types::{Role, SessionSummary};

struct StoredSession {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    messages: Vec<(Role, String)>,
    artifacts: BTreeMap<String, String>,
}

#[derive(Default)]
struct MemoryState {
    sessions: Vec<StoredSession>,
    next_id: usize,
    scripted_artifacts: Vec<ArtifactPayload>,
    last_request: Option<SendRequest>,
}

impl MemoryState {
    fn create(&mut self, name: &str) -> String {
        self.next_id += 1;
        let id = format!("session-{}", self.next_id);
        self.sessions.push(StoredSession {
            id: id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
            artifacts: BTreeMap::new(),
        });
        id
    }

    fn find(&mut self, id: &str) -> Result<&mut StoredSession, BackendError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }
}

/// In-memory backend with switches for failure and for holding sends open.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    unreachable: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    pending: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    fn reachable(&self) -> Result<(), BackendError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(BackendError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Makes every following send wait until the returned `Notify` fires.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    /// Sends currently parked on the gate.
    pub fn pending_sends(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SendRequest> {
        self.state().last_request.clone()
    }

    /// Artifacts returned by the next send.
    pub fn script_artifacts(&self, artifacts: Vec<ArtifactPayload>) {
        self.state().scripted_artifacts = artifacts;
    }

    /// Adds a session with one user/assistant exchange.
    pub fn seed_session(&self, name: &str, artifacts: &[(&str, &str)]) -> String {
        let mut state = self.state();
        let id = state.create(name);
        if let Ok(session) = state.find(&id) {
            session.messages.push((Role::User, "seeded question".to_string()));
            session.messages.push((Role::Assistant, "seeded answer".to_string()));
            for (artifact, content) in artifacts {
                session.artifacts.insert(artifact.to_string(), content.to_string());
            }
        }
        id
    }

    pub fn has_session(&self, id: &str) -> bool {
        self.state().sessions.iter().any(|s| s.id == id)
    }

    pub fn put_artifact(&self, id: &str, name: &str, content: &str) {
        if let Ok(session) = self.state().find(id) {
            session.artifacts.insert(name.to_string(), content.to_string());
        }
    }
}

#[async_trait]
impl BackendClient for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send_message(&self, request: &SendRequest) -> Result<SendReply, BackendError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.pending.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }

        let mut state = self.state();
        state.last_request = Some(request.clone());
        self.reachable()?;

        let id = match &request.session_id {
            Some(id) if state.sessions.iter().any(|s| &s.id == id) => id.clone(),
            _ => state.create("Chat"),
        };
        let artifacts = std::mem::take(&mut state.scripted_artifacts);
        let response_text = format!("echo: {}", request.content);

        let session = state.find(&id)?;
        session.messages.push((Role::User, request.content.clone()));
        session.messages.push((Role::Assistant, response_text.clone()));
        for artifact in &artifacts {
            session.artifacts.insert(artifact.name.clone(), artifact.content.clone());
        }

        Ok(SendReply {
            response_text,
            artifacts,
            session_id: id,
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        self.reachable()?;
        Ok(self
            .state()
            .sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                created_at: s.created_at,
                last_message_preview: s.messages.last().map(|(_, c)| c.clone()).unwrap_or_default(),
                message_count: s.messages.len(),
            })
            .collect())
    }

    async fn get_session(&self, id: &str) -> Result<SessionRecord, BackendError> {
        self.reachable()?;
        let mut state = self.state();
        let session = state.find(id)?;
        Ok(SessionRecord {
            id: session.id.clone(),
            name: session.name.clone(),
            created_at: session.created_at,
            updated_at: session.created_at,
            message_count: session.messages.len(),
            messages: session
                .messages
                .iter()
                .enumerate()
                .map(|(i, (role, content))| MessageRecord {
                    id: WireId::Number(i as i64 + 1),
                    role: *role,
                    content: content.clone(),
                    timestamp: session.created_at,
                })
                .collect(),
            artifacts: session.artifacts.clone(),
        })
    }

    async fn create_session(&self, name: Option<&str>) -> Result<String, BackendError> {
        self.reachable()?;
        Ok(self.state().create(name.unwrap_or("Chat")))
    }

    async fn delete_session(&self, id: &str) -> Result<(), BackendError> {
        self.reachable()?;
        let mut state = self.state();
        state.find(id)?;
        state.sessions.retain(|s| s.id != id);
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), BackendError> {
        self.reachable()?;
        self.state().sessions.clear();
        Ok(())
    }

    async fn fetch_artifacts(&self, id: &str) -> Result<Vec<ArtifactPayload>, BackendError> {
        self.reachable()?;
        let mut state = self.state();
        let session = state.find(id)?;
        Ok(session
            .artifacts
            .iter()
            .map(|(name, content)| ArtifactPayload {
                name: name.clone(),
                content: content.clone(),
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.reachable().is_ok()
    }
}

/// Creates a dispatcher over `backend` with the default catalog and rules.
pub fn test_dispatcher(backend: Arc<MemoryBackend>) -> MessageDispatcher {
    MessageDispatcher::new(backend, ArtifactCatalog::default(), FallbackResponder::default())
}
