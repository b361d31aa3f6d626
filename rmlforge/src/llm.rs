//! Generator (LLM) provider abstraction.
//!
//! The pipeline talks to the generator through [`LlmProvider`] only; the
//! production implementation speaks the OpenAI-compatible chat-completions
//! protocol, and a scripted stub backs the tests.

use crate::config::LlmConfig;
use crate::error::{Result, RmlForgeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Abstract interface for the generative model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one instruction and return the model's textual reply.
    ///
    /// Transport failures, timeouts and API errors are reported as
    /// [`RmlForgeError::Generation`], never as silently empty text.
    async fn ask(&self, prompt: &str) -> Result<String>;

    fn info(&self) -> LlmProviderInfo;
}

/// Information about a provider, for progress lines and diagnostics.
#[derive(Debug, Clone)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    function: RawFunction,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// OpenAI-compatible provider (works with OpenAI and OpenRouter-style
/// endpoints).
pub struct OpenAiLlmProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiLlmProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RmlForgeError::Generation(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request_body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut request = self.client.post(&url).json(&request_body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RmlForgeError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| RmlForgeError::Generation(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let preview = if raw_body.len() > 500 {
                format!("{}... [truncated, {} chars]", &raw_body[..500], raw_body.len())
            } else {
                raw_body
            };
            return Err(RmlForgeError::Generation(format!(
                "LLM API request failed (HTTP {}): {}",
                status.as_u16(),
                preview
            )));
        }

        let body: ChatResponse = serde_json::from_str(&raw_body).map_err(|e| {
            RmlForgeError::Generation(format!("failed to parse LLM API response: {}", e))
        })?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RmlForgeError::Generation("LLM response missing choices".to_string()))?;

        // Some models answer with a tool invocation instead of text. Surface
        // it in the {"name","parameters"} shape so the content normalizer can
        // deal with it like any other misbehaving reply.
        if let Some(call) = choice.message.tool_calls.into_iter().next() {
            let parameters: serde_json::Value = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| json!({ "raw_arguments": call.function.arguments }));
            return Ok(json!({ "name": call.function.name, "parameters": parameters }).to_string());
        }

        Ok(choice.message.content.unwrap_or_default())
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "openai-compatible".to_string(),
            model: self.config.model.clone(),
        }
    }
}

#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<T> {
    async fn ask(&self, prompt: &str) -> Result<String> {
        (**self).ask(prompt).await
    }

    fn info(&self) -> LlmProviderInfo {
        (**self).info()
    }
}

/// Deterministic provider for tests: replays a script of replies, counting
/// calls so budget bounds can be asserted.
pub struct StubLlmProvider {
    script: std::sync::Mutex<std::collections::VecDeque<ScriptedReply>>,
    calls: std::sync::atomic::AtomicU32,
}

/// One scripted stub reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    TransportError(String),
}

impl StubLlmProvider {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into_iter().collect()),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Convenience constructor for all-text scripts.
    pub fn with_texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| ScriptedReply::Text(t.to_string()))
                .collect(),
        )
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn ask(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let reply = self
            .script
            .lock()
            .map_err(|_| RmlForgeError::Generation("stub script lock poisoned".to_string()))?
            .pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::TransportError(message)) => {
                Err(RmlForgeError::Generation(message))
            }
            None => Err(RmlForgeError::Generation(
                "stub script exhausted".to_string(),
            )),
        }
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "stub".to_string(),
            model: "stub-model".to_string(),
        }
    }
}
