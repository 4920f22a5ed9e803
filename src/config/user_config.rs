//! User-level configuration for smellcmp
//!
//! Supports loading LLM credentials from:
//! - Environment variables
//! - ~/.config/smellcmp/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub ai: UserAiConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserAiConfig {
    /// Anthropic API key
    pub anthropic_api_key: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Default backend: "openai" (default), "anthropic", "deepinfra", "openrouter", "ollama"
    pub backend: Option<String>,

    /// Default model
    pub model: Option<String>,
}

impl UserConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/smellcmp/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = UserConfig::default();

        if let Some(user_config) = Self::user_config_path()
            .filter(|p| p.exists())
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|content| toml::from_str::<UserConfig>(&content).ok())
        {
            config.merge(user_config);
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.ai.anthropic_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.ai.openai_api_key = Some(key);
        }

        Ok(config)
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("smellcmp").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: UserConfig) {
        if other.ai.anthropic_api_key.is_some() {
            self.ai.anthropic_api_key = other.ai.anthropic_api_key;
        }
        if other.ai.openai_api_key.is_some() {
            self.ai.openai_api_key = other.ai.openai_api_key;
        }
        if other.ai.backend.is_some() {
            self.ai.backend = other.ai.backend;
        }
        if other.ai.model.is_some() {
            self.ai.model = other.ai.model;
        }
    }

    /// API key stored for a backend env var name, if any
    pub fn api_key_for(&self, env_key: &str) -> Option<&str> {
        match env_key {
            "ANTHROPIC_API_KEY" => self.ai.anthropic_api_key.as_deref(),
            "OPENAI_API_KEY" => self.ai.openai_api_key.as_deref(),
            _ => None,
        }
    }
}
