//! # Artifacts
//!
//! The fixed set of named documents a session evolves. The set is
//! configuration (`ArtifactCatalog`), never discovered from responses:
//! unknown names coming back from the backend are dropped, and every
//! configured name is always present in an `Artifacts` value.

use log::debug;
use serde::Serialize;

const AGENTS_EMPTY: &str = "# Agents configuration will be generated here
agents:
  # Your agents will appear here
";

const AGENTS_PLACEHOLDER: &str = "# Agents configuration will be generated here
agents:
  # Your agents will appear here
  # Example:
  # example_agent:
  #   type: openai
  #   config:
  #     model: gpt-4
  #     api_key: ${OPENAI_API_KEY}
";

const WORKFLOW_EMPTY: &str = "# Workflow configuration will be generated here
workflow:
  # Your workflow will appear here
";

const WORKFLOW_PLACEHOLDER: &str = "# Workflow configuration will be generated here
workflow:
  # Your workflow will appear here
  # Example:
  # name: \"My Workflow\"
  # steps:
  #   - name: \"process_request\"
  #     agent: \"example_agent\"
";

/// One configured artifact name with its template texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSlot {
    pub name: String,
    /// Content of the artifact in a freshly created session.
    pub empty_template: String,
    /// Explanatory content used by the fallback responder when nothing matched.
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub content: String,
}

/// A complete artifact mapping, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Artifacts {
    entries: Vec<Artifact>,
}

impl Artifacts {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.content.as_str())
    }

    /// Replaces the content of `name`. Returns false for names outside the set.
    pub fn set(&mut self, name: &str, content: String) -> bool {
        match self.entries.iter_mut().find(|a| a.name == name) {
            Some(artifact) => {
                artifact.content = content;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCatalog {
    slots: Vec<ArtifactSlot>,
}

impl Default for ArtifactCatalog {
    fn default() -> Self {
        Self::new(vec![
            ArtifactSlot {
                name: "agents.yaml".to_string(),
                empty_template: AGENTS_EMPTY.to_string(),
                placeholder: AGENTS_PLACEHOLDER.to_string(),
            },
            ArtifactSlot {
                name: "workflow.yaml".to_string(),
                empty_template: WORKFLOW_EMPTY.to_string(),
                placeholder: WORKFLOW_PLACEHOLDER.to_string(),
            },
        ])
    }
}

impl ArtifactCatalog {
    /// Builds a catalog; later slots with an already-seen name are ignored.
    pub fn new(slots: Vec<ArtifactSlot>) -> Self {
        let mut unique: Vec<ArtifactSlot> = Vec::with_capacity(slots.len());
        for slot in slots {
            if unique.iter().any(|s| s.name == slot.name) {
                debug!("Duplicate artifact slot ignored: {}", slot.name);
                continue;
            }
            unique.push(slot);
        }
        Self { slots: unique }
    }

    pub fn slots(&self) -> &[ArtifactSlot] {
        &self.slots
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn slot(&self, name: &str) -> Option<&ArtifactSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Every slot at its empty template.
    pub fn empty_artifacts(&self) -> Artifacts {
        Artifacts {
            entries: self
                .slots
                .iter()
                .map(|slot| Artifact {
                    name: slot.name.clone(),
                    content: slot.empty_template.clone(),
                })
                .collect(),
        }
    }

    /// Maps backend-provided contents onto the catalog.
    ///
    /// Content is normalized; missing names keep their empty template and
    /// names outside the catalog are dropped.
    pub fn artifacts_from<I, N, C>(&self, entries: I) -> Artifacts
    where
        I: IntoIterator<Item = (N, C)>,
        N: AsRef<str>,
        C: AsRef<str>,
    {
        let mut artifacts = self.empty_artifacts();
        for (name, content) in entries {
            let name = name.as_ref();
            if !artifacts.set(name, normalize_artifact(content.as_ref())) {
                debug!("Ignoring artifact outside the catalog: {}", name);
            }
        }
        artifacts
    }
}

/// Strips fence marker lines (```` ```yaml ````, ```` ``` ````) and
/// surrounding blank space. Non-empty output ends in exactly one newline.
pub fn normalize_artifact(content: &str) -> String {
    let body: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .skip_while(|line| line.trim().is_empty())
        .collect();

    let mut normalized = body.join("\n").trim_end().to_string();
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    normalized
}
