//! # Artifact Version Tracker
//!
//! Remembers, per artifact name, the last content that was shown so the
//! diff engine gets a `(previous, current)` pair exactly once per change.
//!
//! ```text
//! observe("a", X)   ("", X)    first sighting
//! observe("a", X)   (X, X)     unchanged: no diff to show
//! observe("a", Y)   (X, Y)     changed: previous is the value before this change
//! ```
//!
//! Only the most recent content is kept; there is no history.

use std::collections::HashMap;

/// The pair handed to `diff::diff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactVersionPair {
    pub previous: String,
    pub current: String,
}

impl ArtifactVersionPair {
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Debug, Default)]
pub struct ArtifactVersionTracker {
    last_seen: HashMap<String, String>,
}

impl ArtifactVersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `content` as the latest version of `name` and returns the
    /// pair to diff. Unchanged content yields `previous == current`.
    pub fn observe(&mut self, name: &str, content: &str) -> ArtifactVersionPair {
        let last_seen = self.last_seen.get(name).map(String::as_str).unwrap_or("");
        if last_seen == content {
            return ArtifactVersionPair {
                previous: content.to_string(),
                current: content.to_string(),
            };
        }

        let previous = self
            .last_seen
            .insert(name.to_string(), content.to_string())
            .unwrap_or_default();
        ArtifactVersionPair {
            previous,
            current: content.to_string(),
        }
    }

    /// Content most recently observed for `name` (empty if never observed).
    pub fn last_seen(&self, name: &str) -> &str {
        self.last_seen.get(name).map(String::as_str).unwrap_or("")
    }

    /// Forgets `name`, so its next observation diffs against empty.
    pub fn reset(&mut self, name: &str) {
        self.last_seen.remove(name);
    }

    pub fn reset_all(&mut self) {
        self.last_seen.clear();
    }
}
