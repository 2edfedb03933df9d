//! Model-backed proposal generator.

use async_trait::async_trait;
use serde::Deserialize;

use super::{prompts, GenerationRequest, Generator};
use crate::ai::{AIClient, AIError};
use crate::workflow::Stage;

#[derive(Debug, Deserialize)]
struct ProposalReply {
    items: Vec<String>,
}

/// Generates a stage's items with the language model.
pub struct LlmGenerator {
    client: AIClient,
    system: String,
}

impl LlmGenerator {
    pub fn new(client: AIClient, stage: Stage) -> Self {
        Self { client, system: prompts::generator_system(stage) }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, AIError> {
        tracing::debug!(
            stage = %request.stage,
            previous = request.items.len(),
            revising = request.change_request.is_some(),
            "Generating proposal"
        );

        let user = prompts::generator_user(request);
        let reply: ProposalReply = self.client.structured(&self.system, &user).await?;

        let items: Vec<String> = reply
            .items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();

        if items.is_empty() {
            return Err(AIError::MalformedResponse(format!(
                "model proposed no {}",
                request.stage.kind()
            )));
        }

        Ok(items)
    }
}
