use anyhow::{Context, Result};

use crate::anthropic::LanguageModel;

use super::error::TriageError;
use super::models::{Email, Score};
use super::normalize::{ContentBlockNormalizer, ResponseNormalizer};
use super::prompt::{ScoreSchema, render_triage_prompt};

/// Scores a batch of emails with exactly one model call.
pub struct Scorer {
    model: Box<dyn LanguageModel>,
    normalizer: Box<dyn ResponseNormalizer>,
    schema: ScoreSchema,
}

impl Scorer {
    pub fn new(model: Box<dyn LanguageModel>, schema: ScoreSchema) -> Self {
        Self {
            model,
            normalizer: Box::new(ContentBlockNormalizer),
            schema,
        }
    }

    pub fn normalizer(mut self, normalizer: Box<dyn ResponseNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Returns one score per email in the same order. Fails if the
    /// model's answer can't be aligned with the input.
    pub async fn score(&self, emails: &[Email]) -> Result<Vec<Score>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = render_triage_prompt(emails, self.schema)?;
        tracing::debug!("Scoring {} emails", emails.len());

        let response = self
            .model
            .complete(&prompt)
            .await
            .context("Scoring request failed")?;
        let text = self.normalizer.normalize(&response)?;
        let scores = parse_scores(&text, emails.len())?;

        Ok(scores)
    }
}

/// Parses the model's JSON array and checks it lines up with the
/// `expected` number of emails.
pub fn parse_scores(text: &str, expected: usize) -> Result<Vec<Score>, TriageError> {
    let scores: Vec<Score> = serde_json::from_str(text)?;

    if scores.len() != expected {
        return Err(TriageError::CountMismatch {
            expected,
            actual: scores.len(),
        });
    }

    for (position, score) in scores.iter().enumerate() {
        if let Some(echoed) = score.index
            && echoed != position + 1
        {
            return Err(TriageError::IndexMismatch {
                position: position + 1,
                echoed,
            });
        }
    }

    Ok(scores)
}
