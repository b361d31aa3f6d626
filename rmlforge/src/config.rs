//! Explicit configuration value objects.
//!
//! The core never reads the process environment; the binary fills these in
//! from CLI arguments and env fallbacks and hands them to the orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generator (LLM) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 300,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Per-phase retry budget and backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum generator calls per phase.
    pub max_attempts: u32,
    /// Fixed delay between failed attempts.
    pub backoff_ms: u64,
    /// Embed the previous draft and diagnostic into refinement prompts.
    pub send_error_feedback: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
            send_error_feedback: true,
        }
    }
}

/// Everything the orchestrator needs for one run, minus the input paths
/// (those are arguments to `Pipeline::run`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub output_file: PathBuf,
}
