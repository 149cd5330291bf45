//! The scoring prompt, rendered with Handlebars. Email content is
//! untrusted input so the template only gets the fields it needs and
//! no custom helpers beyond `inc`.

use anyhow::Result;
use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde_json::json;

use super::models::Email;

// `@index` starts at 0 but the numbered blocks start at 1
handlebars_helper!(inc: |v: i64| format!("{}", v + 1));

const TRIAGE_TEMPLATE_NAME: &str = "triage";

const TRIAGE_PROMPT: &str = r#"You are an email triage assistant. Score each email's priority on a 1-5 scale and give a short reason.

Priority scale:
  5 - Urgent: requires immediate action (e.g. outages, deadlines, security alerts)
  4 - High: needs attention today (e.g. requests from managers, important clients)
  3 - Normal: routine business communication
  2 - Low: can wait a few days
  1 - Minimal: newsletters, automated notifications, marketing

Emails:
{{#each emails}}
[{{inc @index}}]
From: {{sender}}
Subject: {{subject}}
Snippet: {{snippet}}

{{/each}}
Return ONLY a valid JSON array with exactly {{count}} objects in the same order as the numbered emails, no other text. Each object repeats the email's number as "index":
{{#if action_needed}}
[{"index": <number>, "priority": <1-5>, "reason": "<one concise sentence summary>", "action_needed": <true|false>}]
{{else}}
[{"index": <number>, "priority": <1-5>, "reason": "<one concise sentence>"}]
{{/if}}
"#;

/// Which fields the model is asked to return per email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSchema {
    PriorityOnly,
    WithActionNeeded,
}

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(no_escape);
    registry.register_helper("inc", Box::new(inc));
    registry
        .register_template_string(TRIAGE_TEMPLATE_NAME, TRIAGE_PROMPT)
        .expect("Failed to register template");
    registry
}

/// Renders the single prompt that encodes every email in order.
pub fn render_triage_prompt(emails: &[Email], schema: ScoreSchema) -> Result<String> {
    let prompt = templates().render(
        TRIAGE_TEMPLATE_NAME,
        &json!({
            "emails": emails,
            "count": emails.len(),
            "action_needed": schema == ScoreSchema::WithActionNeeded,
        }),
    )?;
    Ok(prompt.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emails() -> Vec<Email> {
        vec![
            Email::new("m1", "Server down", "ops@example.com", "prod is on fire"),
            Email::new("m2", "Weekly news", "news@example.com", "Top stories & more"),
        ]
    }

    #[test]
    fn it_numbers_emails_from_one_in_order() {
        let prompt = render_triage_prompt(&emails(), ScoreSchema::PriorityOnly).unwrap();
        let first = prompt
            .find("[1]\nFrom: ops@example.com\nSubject: Server down\nSnippet: prod is on fire")
            .expect("first block missing");
        let second = prompt
            .find("[2]\nFrom: news@example.com\nSubject: Weekly news\nSnippet: Top stories & more")
            .expect("second block missing");
        assert!(first < second);
        assert!(!prompt.contains("[0]"));
        assert!(!prompt.contains("[3]"));
    }

    #[test]
    fn it_states_the_expected_count() {
        let prompt = render_triage_prompt(&emails(), ScoreSchema::PriorityOnly).unwrap();
        assert!(prompt.contains("exactly 2 objects"));
    }

    #[test]
    fn it_includes_the_rubric() {
        let prompt = render_triage_prompt(&emails(), ScoreSchema::PriorityOnly).unwrap();
        assert!(prompt.contains("5 - Urgent"));
        assert!(prompt.contains("4 - High"));
        assert!(prompt.contains("3 - Normal"));
        assert!(prompt.contains("2 - Low"));
        assert!(prompt.contains("1 - Minimal"));
    }

    #[test]
    fn it_asks_for_action_needed_only_in_digest_schema() {
        let without = render_triage_prompt(&emails(), ScoreSchema::PriorityOnly).unwrap();
        assert!(!without.contains("action_needed"));

        let with = render_triage_prompt(&emails(), ScoreSchema::WithActionNeeded).unwrap();
        assert!(with.contains(r#""action_needed": <true|false>"#));
    }

    #[test]
    fn it_does_not_html_escape_email_content() {
        let prompt = render_triage_prompt(&emails(), ScoreSchema::PriorityOnly).unwrap();
        assert!(prompt.contains("Top stories & more"));
        assert!(!prompt.contains("&amp;"));
    }
}
