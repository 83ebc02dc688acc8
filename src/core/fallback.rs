//! # Fallback Responder
//!
//! Produces a local assistant turn when the backend cannot be reached.
//! Matching is data, not code: each `FallbackRule` binds a keyword list to
//! one artifact template. Rules come from config and can be tested on
//! their own.
//!
//! - Keywords match case-insensitively as substrings of the message.
//! - The first matching rule for an artifact wins.
//! - No match at all: every artifact gets its catalog placeholder.
//! - `{message}` in a template is replaced by the user's text.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::artifact::ArtifactCatalog;

const MESSAGE_SLOT: &str = "{message}";

const AGENTS_TEMPLATE: &str = "# Agents configuration generated from conversation
agents:
  example_agent:
    type: openai
    config:
      model: gpt-4
      api_key: ${OPENAI_API_KEY}
      temperature: 0.7
    description: \"Agent created based on: {message}\"
";

const WORKFLOW_TEMPLATE: &str = "# Workflow configuration generated from conversation
workflow:
  name: \"Generated Workflow\"
  description: \"Workflow created based on: {message}\"
  steps:
    - name: \"example_step\"
      agent: \"example_agent\"
      input:
        prompt: \"Process the request\"
";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FallbackRule {
    pub artifact: String,
    pub keywords: Vec<String>,
    pub template: String,
}

impl FallbackRule {
    fn matches(&self, lowered_message: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && lowered_message.contains(k.as_str()))
    }

    fn render(&self, message: &str) -> String {
        self.template.replace(MESSAGE_SLOT, message)
    }
}

/// The rules shipped when config provides none.
pub fn default_rules() -> Vec<FallbackRule> {
    vec![
        FallbackRule {
            artifact: "agents.yaml".to_string(),
            keywords: ["agent", "openai", "gpt", "llm"].map(String::from).to_vec(),
            template: AGENTS_TEMPLATE.to_string(),
        },
        FallbackRule {
            artifact: "workflow.yaml".to_string(),
            keywords: ["workflow", "step", "process", "pipeline"].map(String::from).to_vec(),
            template: WORKFLOW_TEMPLATE.to_string(),
        },
    ]
}

/// Locally synthesized reply: text plus the artifacts it populates.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReply {
    pub text: String,
    pub artifacts: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct FallbackResponder {
    rules: Vec<FallbackRule>,
    placeholders: Vec<(String, String)>,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new(default_rules(), &ArtifactCatalog::default())
    }
}

impl FallbackResponder {
    /// Rules naming an artifact outside `catalog` are dropped.
    pub fn new(rules: Vec<FallbackRule>, catalog: &ArtifactCatalog) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| {
                let known = catalog.contains(&rule.artifact);
                if !known {
                    warn!("Fallback rule for unknown artifact {} dropped", rule.artifact);
                }
                known
            })
            .map(|mut rule| {
                rule.keywords = rule.keywords.iter().map(|k| k.to_lowercase()).collect();
                rule
            })
            .collect();

        let placeholders = catalog
            .slots()
            .iter()
            .map(|slot| (slot.name.clone(), slot.placeholder.clone()))
            .collect();

        Self { rules, placeholders }
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Deterministic reply for `message`.
    pub fn respond(&self, message: &str) -> FallbackReply {
        let lowered = message.to_lowercase();
        let mut artifacts: Vec<(String, String)> = Vec::new();

        for rule in self.rules.iter().filter(|r| r.matches(&lowered)) {
            if artifacts.iter().any(|(name, _)| *name == rule.artifact) {
                continue;
            }
            artifacts.push((rule.artifact.clone(), rule.render(message)));
        }

        if artifacts.is_empty() {
            artifacts = self.placeholders.clone();
        }

        FallbackReply {
            text: format!(
                "I understand you want to: \"{message}\". I'll help you build the appropriate configuration."
            ),
            artifacts,
        }
    }
}
