//! # Message Dispatcher
//!
//! Drives the send cycle and the session lifecycle against a
//! `BackendClient`, writing results into the `SessionStore`.
//!
//! ```text
//!            send / create / load / delete
//!   Idle ───────────────────────────────────► Sending
//!    ▲                                           │
//!    └──────── reply merged | fallback ◄─────────┘
//! ```
//!
//! One operation at a time. Anything issued while another is in flight is
//! rejected with `DispatchError::Busy` before it touches any state. The
//! busy flag is released by a drop guard, so every exit path (success,
//! fallback, error, panic) returns the dispatcher to `Idle`.
//!
//! The store sits behind a `std::sync::Mutex` that is only ever locked
//! for synchronous sections, never across an await.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::backend::{BackendClient, BackendError, SendReply, SendRequest};
use crate::core::artifact::{ArtifactCatalog, normalize_artifact};
use crate::core::config::ResolvedConfig;
use crate::core::fallback::FallbackResponder;
use crate::core::store::{ArtifactView, SessionStore, StoreError, StoreEvent};
use crate::core::types::{ChatSession, Message};

const DRAFT_NAME: &str = "New chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
}

#[derive(Debug)]
pub enum DispatchError {
    /// Another send or lifecycle operation is in flight.
    Busy,
    NoActiveSession,
    /// The backend does not know this session id.
    NotFound(String),
    /// Backend unreachable or answered with a failure status.
    Transport(BackendError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Busy => write!(f, "another operation is in progress"),
            DispatchError::NoActiveSession => write!(f, "no active session"),
            DispatchError::NotFound(id) => write!(f, "session not found: {id}"),
            DispatchError::Transport(e) => write!(f, "backend failure: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoActiveSession => DispatchError::NoActiveSession,
        }
    }
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(id) => DispatchError::NotFound(id),
            other => DispatchError::Transport(other),
        }
    }
}

/// Result of one send: the assistant turn plus the artifacts as they
/// should now be displayed.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub reply: Message,
    pub artifacts: Vec<ArtifactView>,
    /// True when the backend failed and the reply was synthesized locally.
    pub used_fallback: bool,
}

/// Resets the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read-only access to the store. Mutation goes through the dispatcher so
/// it is serialized by the busy flag.
pub struct StoreView<'a>(MutexGuard<'a, SessionStore>);

impl Deref for StoreView<'_> {
    type Target = SessionStore;

    fn deref(&self) -> &SessionStore {
        &self.0
    }
}

pub struct MessageDispatcher {
    backend: Arc<dyn BackendClient>,
    store: Mutex<SessionStore>,
    responder: FallbackResponder,
    busy: AtomicBool,
}

impl MessageDispatcher {
    /// Starts with a draft session active, so the first send has somewhere
    /// to land before the backend assigns an id.
    pub fn new(
        backend: Arc<dyn BackendClient>,
        catalog: ArtifactCatalog,
        responder: FallbackResponder,
    ) -> Self {
        let mut store = SessionStore::new(catalog);
        let draft = ChatSession::empty(None, DRAFT_NAME, store.catalog().empty_artifacts());
        store.activate(draft);
        info!("Dispatcher ready (backend: {})", backend.name());

        Self {
            backend,
            store: Mutex::new(store),
            responder,
            busy: AtomicBool::new(false),
        }
    }

    pub fn from_config(backend: Arc<dyn BackendClient>, config: &ResolvedConfig) -> Self {
        let responder = FallbackResponder::new(config.fallback_rules.clone(), &config.catalog);
        Self::new(backend, config.catalog.clone(), responder)
    }

    pub fn state(&self) -> DispatchState {
        if self.busy.load(Ordering::Acquire) {
            DispatchState::Sending
        } else {
            DispatchState::Idle
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the store for reading. Do not hold the view across an await.
    pub fn store(&self) -> StoreView<'_> {
        StoreView(self.lock())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.lock().subscribe()
    }

    /// Current artifacts with their diffs against the last shown version.
    /// Marks them as shown.
    pub fn artifact_views(&self) -> Vec<ArtifactView> {
        self.lock().artifact_views()
    }

    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut SessionStore) -> R) -> R {
        f(&mut self.lock())
    }

    fn begin(&self) -> Result<BusyGuard<'_>, DispatchError> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| {
                debug!("Rejected: another operation is in flight");
                DispatchError::Busy
            })
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// Sends `content` as a user turn.
    ///
    /// The user message is appended before the backend is called and is
    /// never rolled back. A backend failure is answered by the fallback
    /// responder, so the only errors are `Busy` and store-level ones.
    pub async fn send(&self, content: &str) -> Result<SendOutcome, DispatchError> {
        let _guard = self.begin()?;

        let session_id = self.with_store(|store| -> Result<Option<String>, DispatchError> {
            if store.active().is_none() {
                let draft = ChatSession::empty(None, DRAFT_NAME, store.catalog().empty_artifacts());
                store.activate(draft);
            }
            store.append_message(Message::user(content))?;
            Ok(store.active_id().map(str::to_string))
        })?;

        let request = SendRequest::user(content, session_id);
        match self.backend.send_message(&request).await {
            Ok(reply) => self.merge_reply(reply).await,
            Err(e) => {
                warn!("Send failed, answering locally: {}", e);
                self.merge_fallback(content)
            }
        }
    }

    async fn merge_reply(&self, reply: SendReply) -> Result<SendOutcome, DispatchError> {
        let assistant = Message::assistant(reply.response_text);

        let adopted = self.with_store(|store| -> Result<bool, DispatchError> {
            store.append_message(assistant.clone())?;
            store.update_artifacts(
                reply
                    .artifacts
                    .iter()
                    .map(|a| (a.name.as_str(), normalize_artifact(&a.content))),
            )?;

            let is_new_id = !reply.session_id.is_empty()
                && store.active_id() != Some(reply.session_id.as_str());
            if is_new_id {
                store.adopt_id(&reply.session_id)?;
            }
            Ok(is_new_id)
        })?;

        if adopted {
            self.sync_roster().await;
        }

        Ok(SendOutcome {
            reply: assistant,
            artifacts: self.with_store(SessionStore::artifact_views),
            used_fallback: false,
        })
    }

    fn merge_fallback(&self, content: &str) -> Result<SendOutcome, DispatchError> {
        let fallback = self.responder.respond(content);
        let assistant = Message::assistant(fallback.text);

        self.with_store(|store| -> Result<SendOutcome, DispatchError> {
            store.append_message(assistant.clone())?;
            store.update_artifacts(
                fallback
                    .artifacts
                    .iter()
                    .map(|(name, body)| (name.as_str(), normalize_artifact(body))),
            )?;
            Ok(SendOutcome {
                reply: assistant,
                artifacts: store.artifact_views(),
                used_fallback: true,
            })
        })
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Creates a backend session and makes it active with empty artifacts.
    /// Returns the new id. On failure the active session is untouched.
    pub async fn create_session(&self, name: Option<&str>) -> Result<String, DispatchError> {
        let _guard = self.begin()?;
        let id = self.start_session(name).await?;
        self.sync_roster().await;
        Ok(id)
    }

    /// Fetches a session and makes it active.
    pub async fn load_session(&self, id: &str) -> Result<(), DispatchError> {
        let _guard = self.begin()?;
        let record = self.backend.get_session(id).await?;

        self.with_store(|store| {
            let session = record.into_session(store.catalog());
            store.clear_active();
            store.activate(session);
        });
        self.sync_roster().await;
        Ok(())
    }

    /// Deletes a session. Deleting the active one immediately starts a new
    /// session, so there is always something active afterwards.
    pub async fn delete_session(&self, id: &str) -> Result<(), DispatchError> {
        let _guard = self.begin()?;
        self.backend.delete_session(id).await?;
        info!("Deleted session {}", id);

        let was_active = self.with_store(|store| {
            store.forget(id);
            store.active_id() == Some(id)
        });
        if was_active {
            self.replace_active().await;
        }
        self.sync_roster().await;
        Ok(())
    }

    /// Deletes every session, then starts a new one.
    pub async fn delete_all_sessions(&self) -> Result<(), DispatchError> {
        let _guard = self.begin()?;
        self.backend.delete_all_sessions().await?;
        info!("Deleted all sessions");

        self.with_store(|store| store.set_roster(Vec::new()));
        self.replace_active().await;
        self.sync_roster().await;
        Ok(())
    }

    /// Replaces the roster with the backend's list.
    pub async fn refresh_roster(&self) -> Result<(), DispatchError> {
        let _guard = self.begin()?;
        let roster = self.backend.list_sessions().await?;
        self.with_store(|store| store.set_roster(roster));
        Ok(())
    }

    /// Re-reads the active session's artifacts from the backend and merges
    /// them in. Returns the refreshed views.
    pub async fn refresh_artifacts(&self) -> Result<Vec<ArtifactView>, DispatchError> {
        let _guard = self.begin()?;
        let id = self
            .with_store(|store| store.active_id().map(str::to_string))
            .ok_or(DispatchError::NoActiveSession)?;

        let payloads = self.backend.fetch_artifacts(&id).await?;
        self.with_store(|store| -> Result<Vec<ArtifactView>, DispatchError> {
            store.update_artifacts(
                payloads
                    .iter()
                    .map(|p| (p.name.as_str(), normalize_artifact(&p.content))),
            )?;
            Ok(store.artifact_views())
        })
    }

    /// Backend create + local activation, without touching the roster.
    async fn start_session(&self, name: Option<&str>) -> Result<String, DispatchError> {
        let id = self.backend.create_session(name).await?;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Chat {}", Utc::now().format("%Y-%m-%d %H:%M")));

        self.with_store(|store| {
            let artifacts = store.catalog().empty_artifacts();
            store.clear_active();
            store.activate(ChatSession::empty(Some(id.clone()), name, artifacts));
        });
        Ok(id)
    }

    /// Starts a fresh session after a delete. If the backend cannot create
    /// one, a local draft takes its place.
    async fn replace_active(&self) {
        if let Err(e) = self.start_session(None).await {
            warn!("Could not create a replacement session, using a draft: {}", e);
            self.with_store(|store| {
                let draft = ChatSession::empty(None, DRAFT_NAME, store.catalog().empty_artifacts());
                store.clear_active();
                store.activate(draft);
            });
        }
    }

    /// Refreshes the roster; when the list is unavailable, makes sure the
    /// active session is at least listed locally.
    async fn sync_roster(&self) {
        match self.backend.list_sessions().await {
            Ok(roster) => self.with_store(|store| store.set_roster(roster)),
            Err(e) => {
                warn!("Roster refresh failed, keeping local roster: {}", e);
                self.with_store(|store| {
                    if let Some(summary) = store.active().and_then(ChatSession::summary) {
                        store.remember(summary);
                    }
                });
            }
        }
    }
}
