//! Configuration module for smellcmp
//!
//! This module handles:
//! - Study-level configuration (smellcmp.toml): chunk budget, retries,
//!   concurrency, taxonomy extensions
//! - User-level LLM credentials (~/.config/smellcmp/config.toml + env)

mod study_config;
mod user_config;

pub use study_config::{
    load_study_config, AnalysisConfig, ChunkingConfig, LlmSettings, StudyConfig, TaxonomyConfig,
    DEFAULT_EXTENSIONS, EXAMPLE_CONFIG,
};
pub use user_config::{UserAiConfig, UserConfig};
