//! LLM-side smell detection
//!
//! This module sends source chunks to a natural-language model and holds
//! its replies to a strict four-field JSON contract. Supports multiple
//! backends (OpenAI-compatible, Anthropic). Uses BYOK (bring your own key):
//! API keys come from environment variables or the user config.
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: Required for the OpenAI backend
//! - `ANTHROPIC_API_KEY`: Required for the Anthropic backend
//! - `DEEPINFRA_API_KEY`, `OPENROUTER_API_KEY`: for those backends
//!
//! # Example
//!
//! ```rust,ignore
//! use smellcmp::ai::{AiClient, ChunkAnalyzer, LlmBackend, PromptTemplate, RetryPolicy};
//!
//! let client = AiClient::from_env(LlmBackend::OpenAi)?;
//! let prompt = PromptTemplate::default();
//! let analyzer = ChunkAnalyzer::new(&client, &prompt, RetryPolicy::default());
//! let outcome = analyzer.analyze(&chunk);
//! ```

mod analyzer;
mod client;
mod contract;
mod prompts;

pub use analyzer::{
    AnalysisAttempt, AnalysisOutcome, AttemptState, ChunkAnalyzer, FailureReason, RetryPolicy,
};
pub use client::{AiClient, AiConfig, LlmBackend, Message, Role, SmellDetector};
pub use contract::{parse_line_range, parse_reply, strip_code_fences, ContractViolation, SmellReport};
pub use prompts::{PromptTemplate, SYSTEM_PROMPT};

use thiserror::Error;

/// Errors that can occur talking to an LLM backend
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Missing API key: {env_var} not set. Get your key at {signup_url}")]
    MissingApiKey { env_var: String, signup_url: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type AiResult<T> = Result<T, AiError>;
