//! Retrying client around a language model provider.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;

use super::{
    parse_json, AIError, AskResponse, Completion, CompletionRequest, LlmProvider, QuestionInput,
};
use crate::core::{retry_async, Config, RetryConfig};

/// Client used by every agent to talk to the model service.
///
/// Transient failures are retried according to the [`RetryConfig`]; once the
/// attempt cap is exhausted the call fails with [`AIError::ServiceBusy`].
#[derive(Clone)]
pub struct AIClient {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AIClient {
    /// Create a client with default limits.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider, retry: RetryConfig::default(), max_tokens: 2048, temperature: None }
    }

    /// Create a client from the application configuration.
    pub fn from_config(config: &Config, local: bool) -> Result<Self, AIError> {
        let provider: Arc<dyn LlmProvider> =
            Arc::from(super::provider_from_config(&config.llm, local)?);

        Ok(Self::new(provider)
            .with_retry(RetryConfig::from(&config.retry))
            .with_max_tokens(config.llm.max_tokens)
            .with_temperature(config.llm.temperature))
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Model of the underlying provider.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Run a completion with retries.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, AIError> {
        let provider = &self.provider;
        let request = &request;

        let outcome = retry_async(&self.retry, AIError::is_transient, |attempt| async move {
            tracing::debug!(provider = provider.name(), attempt, "Model call");
            provider.complete(request).await
        })
        .await;

        let attempts = outcome.attempts;
        let exhausted = outcome.exhausted;
        outcome.into_result().map_err(|e| {
            if exhausted {
                tracing::error!(attempts, error = %e, "Model service unavailable");
                AIError::ServiceBusy { attempts }
            } else {
                e
            }
        })
    }

    /// Ask for a JSON object and parse it into `T`.
    pub async fn structured<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, AIError> {
        let completion = self.complete(self.request(system, user).json()).await?;
        parse_json(&completion.content)
    }

    /// Plain-text completion with a system prompt.
    pub async fn text(&self, system: &str, user: &str) -> Result<String, AIError> {
        Ok(self.complete(self.request(system, user)).await?.content)
    }

    /// Answer a single validated question (limited to 500 tokens).
    pub async fn ask(&self, question: &QuestionInput) -> Result<AskResponse, AIError> {
        let start = Instant::now();
        let mut request = CompletionRequest::new(question.message()).with_max_tokens(500);
        request.temperature = self.temperature;

        let completion = self.complete(request).await?;

        Ok(AskResponse {
            content: completion.content,
            tokens_used: completion.tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn request(&self, system: &str, user: &str) -> CompletionRequest {
        let mut request =
            CompletionRequest::new(user).with_system(system).with_max_tokens(self.max_tokens);
        request.temperature = self.temperature;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ok, ScriptedProvider};
    use serde::Deserialize;

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let provider = ScriptedProvider::new(vec![Err(AIError::RateLimited(None)), ok("42")]);
        let client = AIClient::new(provider.clone()).with_retry(RetryConfig::immediate(3));

        let answer = client.ask(&QuestionInput::new("meaning?").unwrap()).await.unwrap();

        assert_eq!(answer.content, "42");
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn test_exhaustion_is_service_busy() {
        let provider = ScriptedProvider::new(vec![
            Err(AIError::RateLimited(None)),
            Err(AIError::Timeout),
            Err(AIError::Network("reset".into())),
            ok("too late"),
        ]);
        let client = AIClient::new(provider.clone()).with_retry(RetryConfig::immediate(3));

        let err = client.text("sys", "hi").await.unwrap_err();

        assert!(matches!(err, AIError::ServiceBusy { attempts: 3 }));
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(AIError::Api { status: 401, body: "bad key".into() }),
            ok("unused"),
        ]);
        let client = AIClient::new(provider.clone()).with_retry(RetryConfig::immediate(3));

        let err = client.text("sys", "hi").await.unwrap_err();

        assert!(matches!(err, AIError::Api { status: 401, .. }));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_structured_requests_json() {
        #[derive(Deserialize)]
        struct Reply {
            items: Vec<String>,
        }

        let provider = ScriptedProvider::new(vec![ok(r#"{"items": ["one"]}"#)]);
        let client = AIClient::new(provider.clone()).with_retry(RetryConfig::immediate(1));

        let reply: Reply = client.structured("sys", "user").await.unwrap();

        assert_eq!(reply.items, vec!["one"]);
        let calls = provider.calls();
        assert!(calls[0].json);
        assert_eq!(calls[0].system.as_deref(), Some("sys"));
    }
}
