//! Structured (JSON) output parsing.
//!
//! Models are asked for a JSON object but sometimes wrap it in prose or a
//! code fence. Parsing tries the whole reply first and then, once, the
//! outermost `{...}` span.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::AIError;

const EXCERPT_CHARS: usize = 500;

fn object_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Parse a model reply into `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, AIError> {
    let trimmed = strip_code_fence(raw.trim());

    let first_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let Some(span) = object_span().find(trimmed) else {
        return Err(AIError::MalformedResponse(format!(
            "No valid JSON found in response ({}). Content: {}",
            first_error,
            excerpt(raw)
        )));
    };

    tracing::debug!(error = %first_error, "Direct JSON parse failed, trying extracted object");

    serde_json::from_str::<T>(span.as_str()).map_err(|e| {
        AIError::MalformedResponse(format!(
            "Failed to parse response: {}. Content: {}",
            e,
            excerpt(raw)
        ))
    })
}

/// Truncate text for error messages.
pub fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
