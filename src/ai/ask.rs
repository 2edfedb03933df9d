//! One-shot question input and answer types.

use super::AIError;

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// A validated question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionInput {
    message: String,
}

impl QuestionInput {
    /// Validate a raw question: trimmed, 1 to 1000 characters.
    pub fn new(raw: &str) -> Result<Self, AIError> {
        let message = raw.trim();
        let len = message.chars().count();
        if len == 0 || len > MAX_QUESTION_CHARS {
            return Err(AIError::InvalidInput(format!(
                "message must be 1-{MAX_QUESTION_CHARS} characters"
            )));
        }
        Ok(Self { message: message.to_string() })
    }

    /// The trimmed question text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Answer to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskResponse {
    /// Answer text
    pub content: String,

    /// Tokens consumed
    pub tokens_used: u32,

    /// Wall-clock latency including retries
    pub latency_ms: u64,
}
