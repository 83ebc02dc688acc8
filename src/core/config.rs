//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.confcraft/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//! The artifact catalog and the fallback keyword rules are configuration
//! too, so they can be tuned without touching code.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::artifact::{ArtifactCatalog, ArtifactSlot};
use crate::core::fallback::{FallbackRule, default_rules};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfcraftConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
    #[serde(default)]
    pub fallback_rules: Vec<FallbackRule>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub empty_template: Option<String>,
    pub placeholder: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub log_level: LevelFilter,
    pub catalog: ArtifactCatalog,
    pub fallback_rules: Vec<FallbackRule>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.confcraft/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".confcraft").join("config.toml"))
}

/// Load config from `~/.confcraft/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ConfcraftConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ConfcraftConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ConfcraftConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ConfcraftConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: ConfcraftConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Confcraft Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# log_level = "debug"                # "error", "warn", "info", "debug", "trace", "off"

# [backend]
# base_url = "http://localhost:8000" # Or set CONFCRAFT_BACKEND_URL env var
# timeout_secs = 30

# Artifact slots. Omit to use agents.yaml + workflow.yaml.
# [[artifacts]]
# name = "agents.yaml"
# empty_template = "agents:\n"
# placeholder = "agents:\n  # describe your agents\n"

# Keyword rules for the offline responder. {message} is the user's text.
# [[fallback_rules]]
# artifact = "agents.yaml"
# keywords = ["agent", "openai", "gpt", "llm"]
# template = "agents:\n  example_agent:\n    description: \"{message}\"\n"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_base_url` is from the CLI flag (None = not specified).
pub fn resolve(config: &ConfcraftConfig, cli_base_url: Option<&str>) -> ResolvedConfig {
    // Backend URL: CLI → env → config → default
    let base_url = cli_base_url
        .map(|s| s.to_string())
        .or_else(|| std::env::var("CONFCRAFT_BACKEND_URL").ok())
        .or_else(|| config.backend.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    // Log level: env → config → default
    let log_level = std::env::var("CONFCRAFT_LOG_LEVEL")
        .ok()
        .or_else(|| config.general.log_level.clone())
        .map(|raw| parse_log_level(&raw))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    let catalog = resolve_catalog(&config.artifacts);

    let fallback_rules = if config.fallback_rules.is_empty() {
        default_rules()
    } else {
        config.fallback_rules.clone()
    };

    ResolvedConfig {
        base_url,
        timeout: Duration::from_secs(config.backend.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        log_level,
        catalog,
        fallback_rules,
    }
}

fn parse_log_level(raw: &str) -> LevelFilter {
    raw.parse().unwrap_or_else(|_| {
        warn!("Unknown log level {:?}, using {}", raw, DEFAULT_LOG_LEVEL);
        DEFAULT_LOG_LEVEL
    })
}

/// Builds the catalog from config entries. Templates missing from an entry
/// come from the built-in slot of the same name, else empty.
fn resolve_catalog(entries: &[ArtifactEntry]) -> ArtifactCatalog {
    if entries.is_empty() {
        return ArtifactCatalog::default();
    }

    let builtin = ArtifactCatalog::default();
    let slots = entries
        .iter()
        .map(|entry| {
            let known = builtin.slot(&entry.name);
            let empty_template = entry
                .empty_template
                .clone()
                .or_else(|| known.map(|s| s.empty_template.clone()))
                .unwrap_or_default();
            let placeholder = entry
                .placeholder
                .clone()
                .or_else(|| known.map(|s| s.placeholder.clone()))
                .unwrap_or_else(|| empty_template.clone());
            ArtifactSlot {
                name: entry.name.clone(),
                empty_template,
                placeholder,
            }
        })
        .collect();

    ArtifactCatalog::new(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = ConfcraftConfig::default();
        assert!(config.artifacts.is_empty());
        assert!(config.backend.base_url.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = ConfcraftConfig::default();
        let resolved = resolve(&config, Some(DEFAULT_BACKEND_URL));
        assert_eq!(resolved.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(resolved.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(resolved.catalog, ArtifactCatalog::default());
        assert_eq!(resolved.fallback_rules, default_rules());
    }

    #[test]
    fn test_resolve_cli_base_url_wins() {
        let config = ConfcraftConfig {
            backend: BackendConfig {
                base_url: Some("http://config:9000".to_string()),
                timeout_secs: Some(5),
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some("http://cli:7000"));
        assert_eq!(resolved.base_url, "http://cli:7000");
        assert_eq!(resolved.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("info"), LevelFilter::Info);
        assert_eq!(parse_log_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_log_level("loud"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
log_level = "info"

[backend]
base_url = "http://192.168.1.100:8000"
timeout_secs = 10

[[artifacts]]
name = "agents.yaml"

[[artifacts]]
name = "tools.yaml"
empty_template = "tools:\n"

[[fallback_rules]]
artifact = "tools.yaml"
keywords = ["tool", "mcp"]
template = "tools:\n  - {message}\n"
"#;
        let config: ConfcraftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("info"));
        assert_eq!(config.backend.timeout_secs, Some(10));
        assert_eq!(config.artifacts.len(), 2);
        assert_eq!(config.fallback_rules[0].keywords, vec!["tool", "mcp"]);

        let resolved = resolve(&config, Some("http://cli"));
        let names: Vec<&str> = resolved.catalog.slots().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["agents.yaml", "tools.yaml"]);
        // Built-in templates fill in for known names
        assert!(resolved.catalog.slots()[0].empty_template.contains("agents:"));
        // Placeholder defaults to the empty template
        assert_eq!(resolved.catalog.slots()[1].placeholder, "tools:\n");
        assert_eq!(resolved.fallback_rules.len(), 1);
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[backend]
timeout_secs = 3
"#;
        let config: ConfcraftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.timeout_secs, Some(3));
        assert!(config.backend.base_url.is_none());
        assert!(config.general.log_level.is_none());
        assert!(config.fallback_rules.is_empty());
    }
}
