//! Turns scored emails into the text of one chat notification.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};
use chrono::NaiveDate;

use super::models::{Email, Score, ScoredEmail, pair};
use super::prompt::ScoreSchema;

/// Lowest priority that filter mode sends.
pub const FILTER_MIN_PRIORITY: i64 = 4;

pub const DEFAULT_SYMBOL: &str = "❔";

const PRIORITY_SYMBOLS: [(i64, &str); 5] = [
    (1, "⚪"),
    (2, "🟢"),
    (3, "🔵"),
    (4, "🟠"),
    (5, "🔴"),
];

pub fn priority_symbol(priority: i64) -> &'static str {
    PRIORITY_SYMBOLS
        .iter()
        .find(|(p, _)| *p == priority)
        .map(|(_, symbol)| *symbol)
        .unwrap_or(DEFAULT_SYMBOL)
}

pub fn gmail_link(message_id: &str) -> String {
    format!("https://mail.google.com/mail/u/0/#all/{}", message_id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Only high priority emails, nothing sent when there are none
    Filter,
    /// Every email sorted by priority, always sent
    Digest,
}

impl RenderMode {
    pub fn schema(&self) -> ScoreSchema {
        match self {
            RenderMode::Filter => ScoreSchema::PriorityOnly,
            RenderMode::Digest => ScoreSchema::WithActionNeeded,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RenderMode::Filter => write!(f, "filter"),
            RenderMode::Digest => write!(f, "digest"),
        }
    }
}

impl FromStr for RenderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filter" => Ok(RenderMode::Filter),
            "digest" => Ok(RenderMode::Digest),
            other => Err(anyhow!(
                "Unknown triage mode '{}', expected 'filter' or 'digest'",
                other
            )),
        }
    }
}

/// Renders the notification for `mode`. `None` means nothing should
/// be sent.
pub fn render(
    mode: RenderMode,
    emails: &[Email],
    scores: &[Score],
    today: NaiveDate,
) -> Option<String> {
    let pairs = pair(emails, scores);
    match mode {
        RenderMode::Filter => render_filtered(&select_high_priority(&pairs)),
        RenderMode::Digest => render_digest(&sort_by_priority(&pairs), today),
    }
}

/// Pairs at or above `FILTER_MIN_PRIORITY`, in fetch order.
pub fn select_high_priority<'a>(pairs: &[ScoredEmail<'a>]) -> Vec<ScoredEmail<'a>> {
    pairs
        .iter()
        .filter(|p| p.score.priority >= FILTER_MIN_PRIORITY)
        .copied()
        .collect()
}

/// Highest priority first. `sort_by` is stable so ties keep fetch order.
pub fn sort_by_priority<'a>(pairs: &[ScoredEmail<'a>]) -> Vec<ScoredEmail<'a>> {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| b.score.priority.cmp(&a.score.priority));
    sorted
}

pub fn render_filtered(selected: &[ScoredEmail]) -> Option<String> {
    if selected.is_empty() {
        return None;
    }
    let lines: Vec<String> = selected
        .iter()
        .map(|ScoredEmail { email, score }| {
            format!(
                "{} *[{}]* *{}* — {}\n_{}_",
                priority_symbol(score.priority),
                score.priority,
                email.sender,
                email.subject,
                score.reason
            )
        })
        .collect();
    Some(lines.join("\n\n"))
}

pub fn render_digest(sorted: &[ScoredEmail], today: NaiveDate) -> Option<String> {
    if sorted.is_empty() {
        return None;
    }
    let mut blocks = vec![format!(
        "*📬 Email Digest — {} — {} unread*",
        today.format("%b %d, %Y"),
        sorted.len()
    )];

    for ScoredEmail { email, score } in sorted {
        let action_tag = if score.requires_action() {
            " ⚡ *Action needed*"
        } else {
            ""
        };
        blocks.push(format!(
            "{} *[{}] {}*{}\nFrom: {}\n_{}_\n<{}|Open in Gmail>",
            priority_symbol(score.priority),
            score.priority,
            email.subject,
            action_tag,
            email.sender,
            score.reason,
            gmail_link(&email.id)
        ));
    }

    Some(blocks.join("\n\n"))
}
