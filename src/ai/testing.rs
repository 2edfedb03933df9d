//! Scripted provider for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AIError, Completion, CompletionRequest, LlmProvider};

/// Provider replaying canned results in order.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<Completion, AIError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(mut replies: Vec<Result<Completion, AIError>>) -> std::sync::Arc<Self> {
        replies.reverse();
        std::sync::Arc::new(Self { replies: Mutex::new(replies), calls: Mutex::new(Vec::new()) })
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AIError> {
        self.calls.lock().push(request.clone());
        self.replies.lock().pop().unwrap_or(Err(AIError::NoResponse))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test"
    }
}

pub fn ok(content: &str) -> Result<Completion, AIError> {
    Ok(Completion { content: content.to_string(), tokens_used: 10 })
}
