//! # Domain Types
//!
//! Transcript and roster shapes shared by the store and the dispatcher.
//! Wire shapes live in `backend::types`; these are what the rest of the
//! crate works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::artifact::Artifacts;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Lightweight roster entry, as listed by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_message_preview: String,
    pub message_count: usize,
}

/// Full state of one conversation.
///
/// `id` is `None` for a draft session the backend has not assigned an id
/// to yet (the first send adopts the id from the response).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub id: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub artifacts: Artifacts,
}

impl ChatSession {
    /// A session with an empty transcript and the given artifact set.
    pub fn empty(id: Option<String>, name: impl Into<String>, artifacts: Artifacts) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
            artifacts,
        }
    }

    /// Builds the roster entry for this session.
    /// Returns `None` for drafts.
    pub fn summary(&self) -> Option<SessionSummary> {
        let id = self.id.clone()?;
        Some(SessionSummary {
            id,
            name: self.name.clone(),
            created_at: self.created_at,
            last_message_preview: self
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            message_count: self.messages.len(),
        })
    }
}
