//! Wire shapes of the backend's JSON API, plus their mapping onto the
//! domain types in `core::types`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::artifact::ArtifactCatalog;
use crate::core::types::{ChatSession, Message, Role, SessionSummary};

/// Body of a send-message request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub content: String,
    pub role: Role,
    #[serde(rename = "chat_id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SendRequest {
    pub fn user(content: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
            session_id,
        }
    }
}

/// One artifact as the backend returns it (content may still be fenced).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactPayload {
    pub name: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SendReply {
    #[serde(rename = "response")]
    pub response_text: String,
    #[serde(rename = "yaml_files", default)]
    pub artifacts: Vec<ArtifactPayload>,
    #[serde(rename = "chat_id")]
    pub session_id: String,
}

/// Roster entry as listed by `chat_history`.
#[derive(Deserialize, Debug, Clone)]
pub struct SessionListing {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "last_message", default)]
    pub last_message_preview: String,
    #[serde(default)]
    pub message_count: usize,
}

impl From<SessionListing> for SessionSummary {
    fn from(listing: SessionListing) -> Self {
        SessionSummary {
            id: listing.id,
            name: listing.name,
            created_at: listing.created_at,
            last_message_preview: listing.last_message_preview,
            message_count: listing.message_count,
        }
    }
}

/// Message ids come back as integers from some backends, strings from others.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Number(n) => write!(f, "{n}"),
            WireId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MessageRecord {
    pub id: WireId,
    pub role: Role,
    pub content: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            id: record.id.to_string(),
            role: record.role,
            content: record.content,
            timestamp: record.timestamp,
        }
    }
}

/// Full session as returned by `chat_session/{id}`.
#[derive(Deserialize, Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(rename = "yaml_files", default)]
    pub artifacts: BTreeMap<String, String>,
}

impl SessionRecord {
    /// Maps the record onto the catalog. Artifacts the record lacks fall
    /// back to their empty template.
    pub fn into_session(self, catalog: &ArtifactCatalog) -> ChatSession {
        ChatSession {
            id: Some(self.id),
            name: self.name,
            created_at: self.created_at,
            messages: self.messages.into_iter().map(Message::from).collect(),
            artifacts: catalog.artifacts_from(self.artifacts),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct SessionCreated {
    pub chat_id: String,
}

/// Parses RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(parse_timestamp(&raw).unwrap_or_else(|| {
        debug!("Unparseable timestamp {:?}, using epoch", raw);
        DateTime::<Utc>::default()
    }))
}
