//! Model-backed automated reviewer.

use async_trait::async_trait;
use serde::Deserialize;

use super::{prompts, ReviewInput, ReviewOutcome, Reviewer};
use crate::ai::{AIClient, AIError};
use crate::workflow::Stage;

#[derive(Debug, Deserialize)]
struct ReviewReply {
    approved: bool,
    #[serde(default)]
    changes: Option<String>,
}

/// Reviews a stage's items against the shared rubric.
pub struct LlmReviewer {
    client: AIClient,
    system: String,
}

impl LlmReviewer {
    pub fn new(client: AIClient, stage: Stage) -> Self {
        Self { client, system: prompts::reviewer_system(stage) }
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, input: &ReviewInput<'_>) -> Result<ReviewOutcome, AIError> {
        if input.items.is_empty() {
            return Err(AIError::InvalidInput(format!(
                "no {} provided for review",
                input.stage.kind()
            )));
        }

        let user = prompts::reviewer_user(input);
        let reply: ReviewReply = self.client.structured(&self.system, &user).await?;

        tracing::debug!(stage = %input.stage, approved = reply.approved, "Review complete");

        // The flag decides; notes attached to an approval are dropped
        if reply.approved {
            Ok(ReviewOutcome::approve())
        } else {
            ReviewOutcome::changes(reply.changes.unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ok, ScriptedProvider};
    use crate::core::RetryConfig;
    use std::sync::Arc;

    fn reviewer(provider: Arc<ScriptedProvider>) -> LlmReviewer {
        let client = AIClient::new(provider).with_retry(RetryConfig::no_retry());
        LlmReviewer::new(client, Stage::Features)
    }

    fn items() -> Vec<String> {
        vec!["Share recipes".to_string()]
    }

    #[tokio::test]
    async fn test_empty_items_fail_fast() {
        let provider = ScriptedProvider::new(vec![ok(r#"{"approved": true}"#)]);
        let reviewer = reviewer(provider.clone());
        let input = ReviewInput { stage: Stage::Features, idea: "idea", items: &[] };

        let err = reviewer.review(&input).await.unwrap_err();

        assert!(matches!(err, AIError::InvalidInput(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_approval_drops_notes() {
        let provider =
            ScriptedProvider::new(vec![ok(r#"{"approved": true, "changes": "looks fine"}"#)]);
        let items = items();
        let input = ReviewInput { stage: Stage::Features, idea: "idea", items: &items };

        let outcome = reviewer(provider).review(&input).await.unwrap();

        assert_eq!(outcome, ReviewOutcome::approve());
    }

    #[tokio::test]
    async fn test_rejection_carries_changes() {
        let provider =
            ScriptedProvider::new(vec![ok(r#"{"approved": false, "changes": "add search"}"#)]);
        let items = items();
        let input = ReviewInput { stage: Stage::Features, idea: "idea", items: &items };

        let outcome = reviewer(provider).review(&input).await.unwrap();

        assert!(!outcome.approved);
        assert_eq!(outcome.change_request.as_deref(), Some("add search"));
    }

    #[tokio::test]
    async fn test_rejection_without_changes_is_malformed() {
        let provider = ScriptedProvider::new(vec![ok(r#"{"approved": false, "changes": ""}"#)]);
        let items = items();
        let input = ReviewInput { stage: Stage::Features, idea: "idea", items: &items };

        let err = reviewer(provider).review(&input).await.unwrap_err();

        assert!(matches!(err, AIError::MalformedResponse(_)));
    }
}
