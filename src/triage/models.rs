use serde::{Deserialize, Serialize};

pub const NO_SUBJECT: &str = "(no subject)";
pub const UNKNOWN_SENDER: &str = "(unknown)";

/// Metadata for one fetched email. No body is ever fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
}

impl Email {
    /// Builds an email, substituting placeholders for a blank subject
    /// or sender.
    pub fn new(id: &str, subject: &str, sender: &str, snippet: &str) -> Self {
        let subject = subject.trim();
        let sender = sender.trim();
        Self {
            id: id.to_string(),
            subject: if subject.is_empty() {
                NO_SUBJECT.to_string()
            } else {
                subject.to_string()
            },
            sender: if sender.is_empty() {
                UNKNOWN_SENDER.to_string()
            } else {
                sender.to_string()
            },
            snippet: snippet.to_string(),
        }
    }
}

/// The model's verdict for the email at the same position in the
/// scored batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    // Echo of the 1-based position in the prompt, when the model
    // returns it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub priority: i64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_needed: Option<bool>,
}

impl Score {
    pub fn new(priority: i64, reason: &str) -> Self {
        Self {
            index: None,
            priority,
            reason: reason.to_string(),
            action_needed: None,
        }
    }

    pub fn with_action_needed(mut self, action_needed: bool) -> Self {
        self.action_needed = Some(action_needed);
        self
    }

    pub fn requires_action(&self) -> bool {
        self.action_needed.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredEmail<'a> {
    pub email: &'a Email,
    pub score: &'a Score,
}

/// Pairs emails with scores by position. Callers must have validated
/// that both slices have the same length.
pub fn pair<'a>(emails: &'a [Email], scores: &'a [Score]) -> Vec<ScoredEmail<'a>> {
    debug_assert_eq!(emails.len(), scores.len());
    emails
        .iter()
        .zip(scores.iter())
        .map(|(email, score)| ScoredEmail { email, score })
        .collect()
}
