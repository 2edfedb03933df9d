//! Language model integration.
//!
//! Provides access to hosted (or local OpenAI-compatible) chat models.
//!
//! ## Features
//!
//! - Provider abstraction over OpenAI-compatible and Claude APIs
//! - Bounded retry with exponential backoff for transient failures
//! - Structured JSON output with a single best-effort extraction fallback
//! - Input validation for one-shot questions

mod ask;
mod claude;
mod client;
mod openai;
mod structured;

#[cfg(test)]
pub(crate) mod testing;

pub use ask::{AskResponse, QuestionInput, MAX_QUESTION_CHARS};
pub use claude::ClaudeProvider;
pub use client::AIClient;
pub use openai::OpenAIProvider;
pub use structured::{excerpt, parse_json};

use async_trait::async_trait;

use crate::core::LlmConfig;

/// A single prompt sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions
    pub system: Option<String>,

    /// User message
    pub user: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Ask the provider for a JSON object reply
    pub json: bool,
}

impl CompletionRequest {
    /// Create a plain-text request.
    pub fn new(user: impl Into<String>) -> Self {
        Self { system: None, user: user.into(), max_tokens: 1024, temperature: None, json: false }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request a JSON object reply.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// A provider's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Reply text
    pub content: String,

    /// Tokens consumed (prompt + completion), 0 when unknown
    pub tokens_used: u32,
}

/// Trait for language model providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a single completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model in use.
    fn model(&self) -> &str;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("{0} not set")]
    MissingApiKey(&'static str),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited")]
    RateLimited(Option<u64>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("No response from model")]
    NoResponse,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Service busy, try later")]
    ServiceBusy { attempts: u32 },

    #[error("{0}")]
    InvalidInput(String),
}

impl AIError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Network(_) | Self::Timeout => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AIError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Build the provider selected by the configuration.
///
/// With `local` set, an OpenAI-compatible server at `local_base_url` is used
/// regardless of the configured provider.
pub fn provider_from_config(
    config: &LlmConfig,
    local: bool,
) -> Result<Box<dyn LlmProvider>, AIError> {
    if local {
        return Ok(Box::new(
            OpenAIProvider::local(&config.local_base_url, &config.model)
                .with_timeout(config.request_timeout())?,
        ));
    }

    match config.provider.as_str() {
        "openai" => Ok(Box::new(
            OpenAIProvider::from_env()?
                .with_model(&config.model)
                .with_base_url(&config.base_url)
                .with_timeout(config.request_timeout())?,
        )),
        "claude" | "anthropic" => {
            let mut provider = ClaudeProvider::from_env()?;
            // The OpenAI default model name means nothing to Claude
            if !config.model.starts_with("gpt-") {
                provider = provider.with_model(&config.model);
            }
            Ok(Box::new(provider.with_timeout(config.request_timeout())?))
        }
        other => Err(AIError::ProviderNotAvailable(format!("unknown provider '{other}'"))),
    }
}
