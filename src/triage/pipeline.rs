//! One pass of fetch, score, render, deliver. Any error aborts the run
//! before anything is sent.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::google::gmail::{Mailbox, fetch_emails};
use crate::notify::Notifier;

use super::models::pair;
use super::render::{RenderMode, render, select_high_priority};
use super::scorer::Scorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The mailbox query matched nothing, so nothing was scored.
    NoEmails,
    /// Emails were scored but none qualified for a notification.
    NothingToSend { fetched: usize },
    /// One notification was delivered covering `included` emails.
    Delivered { fetched: usize, included: usize },
}

pub struct Pipeline<'a> {
    pub mailbox: &'a dyn Mailbox,
    pub scorer: &'a Scorer,
    pub notifier: &'a dyn Notifier,
    pub mode: RenderMode,
    pub query: &'a str,
    pub max_results: u32,
}

impl Pipeline<'_> {
    pub async fn run(&self, today: NaiveDate) -> Result<Outcome> {
        println!("Fetching emails matching '{}'…", self.query);
        let emails = fetch_emails(self.mailbox, self.query, self.max_results).await?;
        println!("  Found {} email(s).", emails.len());

        if emails.is_empty() {
            println!("Nothing to process.");
            return Ok(Outcome::NoEmails);
        }

        println!("Scoring with the language model…");
        let scores = self.scorer.score(&emails).await?;
        tracing::info!("Scored {} emails", scores.len());

        let included = match self.mode {
            RenderMode::Filter => {
                let selected = select_high_priority(&pair(&emails, &scores)).len();
                println!("  {} email(s) with priority ≥ 4.", selected);
                selected
            }
            RenderMode::Digest => {
                let action_count = scores.iter().filter(|s| s.requires_action()).count();
                println!("  {} email(s) require action.", action_count);
                emails.len()
            }
        };

        let Some(text) = render(self.mode, &emails, &scores, today) else {
            println!("No high-priority emails, nothing posted.");
            return Ok(Outcome::NothingToSend {
                fetched: emails.len(),
            });
        };

        println!("Posting {} email(s) to the webhook…", included);
        self.notifier
            .deliver(&text)
            .await
            .context("Failed to deliver notification")?;
        println!("Done.");

        Ok(Outcome::Delivered {
            fetched: emails.len(),
            included,
        })
    }
}
