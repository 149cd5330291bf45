//! Reduces a raw model response to the text payload the scorer parses.

use crate::anthropic::{ContentBlock, MessagesResponse};

use super::error::TriageError;

pub trait ResponseNormalizer: Send + Sync {
    fn normalize(&self, response: &MessagesResponse) -> Result<String, TriageError>;
}

/// Keeps the single text block of a Messages API response, dropping
/// thinking blocks, and unwraps a surrounding code fence if present.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentBlockNormalizer;

impl ResponseNormalizer for ContentBlockNormalizer {
    fn normalize(&self, response: &MessagesResponse) -> Result<String, TriageError> {
        let texts: Vec<&str> = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        match texts.as_slice() {
            [] => Err(TriageError::MissingText),
            [text] => Ok(strip_code_fence(text)),
            many => Err(TriageError::MultipleText(many.len())),
        }
    }
}

/// Removes a ```` ``` ```` or ```` ```json ```` wrapper. Text without a
/// fence is returned trimmed, so applying this twice is a no-op.
pub fn strip_code_fence(text: &str) -> String {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text.to_string();
    };
    // Drop the info string (e.g. `json`) on the opening line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}
