//! Claude API integration.
//!
//! Implements the LlmProvider trait for Claude.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AIError, Completion, CompletionRequest, LlmProvider};

/// Claude API provider.
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    ///
    /// Reads API key from ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, AIError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AIError::MissingApiKey("ANTHROPIC_API_KEY"))?;

        Ok(Self { client: Client::new(), api_key, model: "claude-sonnet-4-20250514".to_string() })
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AIError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AIError> {
        let mut system = request.system.clone().unwrap_or_default();
        if request.json {
            // The Messages API has no JSON mode; ask for it in the instructions
            system.push_str("\n\nRespond with a single JSON object and nothing else.");
        }

        let body = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system,
            temperature: request.temperature,
            messages: vec![Message { role: "user".to_string(), content: request.user.clone() }],
        };

        tracing::debug!(provider = "claude", model = %self.model, "Sending message");

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AIError::RateLimited(None));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::Api { status: status.as_u16(), body });
        }

        let response: ClaudeResponse = response.json().await?;
        let tokens_used =
            response.usage.map(|u| u.input_tokens + u.output_tokens).unwrap_or(0);

        response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .map(|content| Completion { content, tokens_used })
            .ok_or(AIError::NoResponse)
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Claude API request structure.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message>,
}

/// Message in a Claude request.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API response structure.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

/// Content block in a Claude response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}
