//! Study-level configuration support
//!
//! Loads the comparison settings from `smellcmp.toml` (or `.smellcmprc.json`)
//! in the working directory. Every component receives the resulting
//! [`StudyConfig`] explicitly; nothing reads it from global state.
//!
//! # Configuration Format
//!
//! ```toml
//! # smellcmp.toml
//!
//! [chunking]
//! max_tokens = 120000
//! extensions = [".java", ".py"]
//!
//! [analysis]
//! max_retries = 2
//! retry_backoff_ms = 1000
//! workers = 8
//! request_timeout_secs = 120
//!
//! [llm]
//! backend = "openai"
//! model = "gpt-4o-mini"
//!
//! [taxonomy.aliases]
//! LongMethod = ["metodo gigante"]
//!
//! [taxonomy.rules]
//! "java:S3776" = "LongMethod"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// File extensions analyzed when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".java", ".js", ".ts", ".go", ".cpp", ".c", ".cs", ".kt", ".swift", ".rb", ".php",
];

/// Root configuration for one comparison study
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StudyConfig {
    pub chunking: ChunkingConfig,
    pub analysis: AnalysisConfig,
    pub llm: LlmSettings,
    pub taxonomy: TaxonomyConfig,
}

/// How source files are packaged into chunks
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Soft token budget per chunk
    pub max_tokens: usize,
    /// File extensions (with leading dot) to analyze
    pub extensions: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 120_000,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ChunkingConfig {
    /// Whether a path has one of the configured extensions
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Retry, concurrency and timeout settings for chunk analysis
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Initial backoff between attempts, doubled each retry (0 disables)
    pub retry_backoff_ms: u64,
    /// Concurrent chunk analyses
    pub workers: usize,
    /// Per-attempt timeout of the remote call
    pub request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 1_000,
            workers: 8,
            request_timeout_secs: 120,
        }
    }
}

/// LLM backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSettings {
    /// openai, anthropic, deepinfra, openrouter, ollama
    pub backend: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    /// Response token cap sent to the API
    pub max_response_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: None,
            model: None,
            temperature: 0.0,
            max_response_tokens: 4096,
        }
    }
}

/// Extra taxonomy entries layered over the built-in tables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Canonical category name -> extra LLM aliases
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Static rule id -> canonical category name
    pub rules: BTreeMap<String, String>,
}

/// Load the study configuration from `dir`.
///
/// Searches for:
/// 1. `smellcmp.toml`
/// 2. `.smellcmprc.json`
///
/// Returns default configuration if no file is found or the file is malformed.
pub fn load_study_config(dir: &Path) -> StudyConfig {
    let toml_path = dir.join("smellcmp.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded study config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = dir.join(".smellcmprc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded study config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No study config found, using defaults");
    StudyConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<StudyConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: StudyConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<StudyConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: StudyConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Example written by `smellcmp init`
pub const EXAMPLE_CONFIG: &str = r#"# smellcmp study configuration

[chunking]
# Soft token budget per chunk sent to the LLM
max_tokens = 120000
# extensions = [".java"]

[analysis]
max_retries = 2
retry_backoff_ms = 1000
workers = 8
request_timeout_secs = 120

[llm]
# backend = "openai"   # openai, anthropic, deepinfra, openrouter, ollama
# model = "gpt-4o-mini"
temperature = 0.0

# Extra LLM phrasings per canonical category
# [taxonomy.aliases]
# LongMethod = ["metodo gigante"]

# Extra static rule ids
# [taxonomy.rules]
# "java:S3776" = "LongMethod"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = StudyConfig::default();
        assert_eq!(config.chunking.max_tokens, 120_000);
        assert_eq!(config.analysis.max_retries, 2);
        assert_eq!(config.analysis.workers, 8);
        assert_eq!(config.llm.temperature, 0.0);
        assert!(config.taxonomy.aliases.is_empty());
    }

    #[test]
    fn test_example_config_parses() {
        let config: StudyConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.chunking.max_tokens, 120_000);
        assert_eq!(config.analysis.request_timeout_secs, 120);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[analysis]
workers = 2

[taxonomy.aliases]
LongMethod = ["metodo gigante"]

[taxonomy.rules]
"java:S3776" = "LongMethod"
"#;
        let config: StudyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analysis.workers, 2);
        assert_eq!(config.analysis.max_retries, 2);
        assert_eq!(config.chunking.max_tokens, 120_000);
        assert_eq!(
            config.taxonomy.aliases.get("LongMethod").unwrap(),
            &vec!["metodo gigante".to_string()]
        );
        assert_eq!(config.taxonomy.rules.get("java:S3776").unwrap(), "LongMethod");
    }

    #[test]
    fn test_extension_filter() {
        let config = ChunkingConfig::default();
        assert!(config.accepts(Path::new("src/Foo.java")));
        assert!(config.accepts(Path::new("a/b.PY")));
        assert!(!config.accepts(Path::new("README.md")));
        assert!(!config.accepts(Path::new("Makefile")));
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = load_study_config(dir.path());
        assert_eq!(config.chunking.max_tokens, 120_000);
    }

    #[test]
    fn test_load_malformed_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("smellcmp.toml"), "this is [[ not toml").unwrap();
        let config = load_study_config(dir.path());
        assert_eq!(config.analysis.max_retries, 2);
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".smellcmprc.json"),
            r#"{"chunking": {"max_tokens": 500}}"#,
        )
        .unwrap();
        let config = load_study_config(dir.path());
        assert_eq!(config.chunking.max_tokens, 500);
    }
}
