//! # Session Store
//!
//! Client-side cache of the session roster plus the full state of the one
//! active session. Domain logic only, no I/O.
//!
//! ```text
//! SessionStore
//! ├── catalog: ArtifactCatalog          // configured artifact names
//! ├── roster: Vec<SessionSummary>       // server-authoritative list
//! ├── active: Option<ChatSession>       // transcript + artifacts
//! ├── tracker: ArtifactVersionTracker   // last shown content per artifact
//! └── events: broadcast::Sender         // change notifications
//! ```
//!
//! Every mutation publishes a `StoreEvent`. Presentation code subscribes
//! instead of being called back from in here.

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::artifact::{ArtifactCatalog, Artifacts};
use crate::core::diff::{DiffLine, DiffStats, diff};
use crate::core::tracker::ArtifactVersionTracker;
use crate::core::types::{ChatSession, Message, SessionSummary};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    RosterChanged(Vec<SessionSummary>),
    /// A session became active. `id` is `None` for drafts.
    SessionActivated { id: Option<String> },
    MessageAppended(Message),
    ArtifactsUpdated(Vec<String>),
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NoActiveSession,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NoActiveSession => write!(f, "no active session"),
        }
    }
}

impl std::error::Error for StoreError {}

/// One artifact ready for display: its content and the diff against the
/// previously shown version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactView {
    pub name: String,
    pub content: String,
    pub lines: Vec<DiffLine>,
    pub changed: bool,
}

pub struct SessionStore {
    catalog: ArtifactCatalog,
    roster: Vec<SessionSummary>,
    active: Option<ChatSession>,
    tracker: ArtifactVersionTracker,
    events: broadcast::Sender<StoreEvent>,
}

impl SessionStore {
    pub fn new(catalog: ArtifactCatalog) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            catalog,
            roster: Vec::new(),
            active: None,
            tracker: ArtifactVersionTracker::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &ArtifactCatalog {
        &self.catalog
    }

    pub fn roster(&self) -> &[SessionSummary] {
        &self.roster
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().and_then(|s| s.id.as_deref())
    }

    /// The active transcript, or an empty slice when nothing is active.
    pub fn messages(&self) -> &[Message] {
        self.active.as_ref().map(|s| s.messages.as_slice()).unwrap_or(&[])
    }

    pub fn artifacts(&self) -> Option<&Artifacts> {
        self.active.as_ref().map(|s| &s.artifacts)
    }

    /// Replaces the roster wholesale.
    pub fn set_roster(&mut self, summaries: Vec<SessionSummary>) {
        if let Some(id) = self.active_id()
            && !summaries.iter().any(|s| s.id == id)
        {
            warn!("Active session {} is missing from the refreshed roster", id);
        }
        debug!("Roster replaced: {} sessions", summaries.len());
        self.roster = summaries;
        self.publish(StoreEvent::RosterChanged(self.roster.clone()));
    }

    /// Inserts or replaces a single roster entry. Only used when the
    /// backend list is unavailable; a later `set_roster` overwrites it.
    pub fn remember(&mut self, summary: SessionSummary) {
        match self.roster.iter_mut().find(|s| s.id == summary.id) {
            Some(existing) => *existing = summary,
            None => self.roster.insert(0, summary),
        }
        self.publish(StoreEvent::RosterChanged(self.roster.clone()));
    }

    /// Drops a roster entry locally.
    pub fn forget(&mut self, id: &str) {
        let before = self.roster.len();
        self.roster.retain(|s| s.id != id);
        if self.roster.len() != before {
            self.publish(StoreEvent::RosterChanged(self.roster.clone()));
        }
    }

    /// Makes `session` the active one and forgets every previously shown
    /// artifact version, so the switch never diffs against the old session.
    /// The activated content counts as shown: the next change diffs from it.
    pub fn activate(&mut self, mut session: ChatSession) {
        session.artifacts = self.catalog.artifacts_from(
            session
                .artifacts
                .iter()
                .map(|a| (a.name.clone(), a.content.clone()))
                .collect::<Vec<_>>(),
        );
        self.tracker.reset_all();
        for artifact in session.artifacts.iter() {
            self.tracker.observe(&artifact.name, &artifact.content);
        }
        info!(
            "Activated session {} ({} messages)",
            session.id.as_deref().unwrap_or("<draft>"),
            session.messages.len()
        );
        let id = session.id.clone();
        self.active = Some(session);
        self.publish(StoreEvent::SessionActivated { id });
    }

    /// Assigns the backend id to the active session (first reply of a draft).
    pub fn adopt_id(&mut self, id: &str) -> Result<(), StoreError> {
        let session = self.active.as_mut().ok_or(StoreError::NoActiveSession)?;
        info!("Adopting session id {}", id);
        session.id = Some(id.to_string());
        self.publish(StoreEvent::SessionActivated {
            id: Some(id.to_string()),
        });
        Ok(())
    }

    pub fn append_message(&mut self, message: Message) -> Result<(), StoreError> {
        let session = self.active.as_mut().ok_or(StoreError::NoActiveSession)?;
        session.messages.push(message.clone());
        self.publish(StoreEvent::MessageAppended(message));
        Ok(())
    }

    /// Merges `partial` into the active artifacts. Names absent from
    /// `partial` keep their content. Returns the names that were written.
    pub fn update_artifacts<I, N, C>(&mut self, partial: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: AsRef<str>,
        C: Into<String>,
    {
        let session = self.active.as_mut().ok_or(StoreError::NoActiveSession)?;
        let mut updated = Vec::new();
        for (name, content) in partial {
            let name = name.as_ref();
            if session.artifacts.set(name, content.into()) {
                updated.push(name.to_string());
            } else {
                debug!("Ignoring update for unknown artifact {}", name);
            }
        }
        if !updated.is_empty() {
            self.publish(StoreEvent::ArtifactsUpdated(updated.clone()));
        }
        Ok(updated)
    }

    pub fn clear_active(&mut self) {
        if self.active.take().is_some() {
            debug!("Active session cleared");
        }
        self.publish(StoreEvent::Cleared);
    }

    /// Observes every active artifact and diffs it against the version
    /// shown before. Unchanged artifacts come back all-equal.
    pub fn artifact_views(&mut self) -> Vec<ArtifactView> {
        let Some(session) = self.active.as_ref() else {
            return Vec::new();
        };

        session
            .artifacts
            .iter()
            .map(|artifact| {
                let pair = self.tracker.observe(&artifact.name, &artifact.content);
                let lines = diff(&pair.previous, &pair.current);
                let changed = DiffStats::of(&lines).has_changes();
                ArtifactView {
                    name: artifact.name.clone(),
                    content: artifact.content.clone(),
                    lines,
                    changed,
                }
            })
            .collect()
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
