use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use crate::anthropic;
use crate::google::gmail::{self, unread_since_yesterday_query};
use crate::triage::RenderMode;

pub const WEBHOOK_URL_VAR: &str = "SLACK_WEBHOOK_URL";
pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DIGEST_QUERY: &str = "in:inbox category:primary";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub mode: RenderMode,
    pub webhook_url: String,
    pub gmail_query: String,
    pub gmail_max_results: u32,
    pub gmail_api_hostname: String,
    pub credentials_dir: PathBuf,
    pub token_path: PathBuf,
    pub anthropic_api_hostname: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_max_tokens: u32,
    pub anthropic_thinking_budget: Option<u32>,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_var(name: &str, hint: &str) -> Result<String> {
    optional_var(name).ok_or(anyhow!(
        "{} environment variable is not set. {}",
        name,
        hint
    ))
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", v, name, e))
        })
        .transpose()
}

/// Loads a `.env` file from the working directory or its parents into
/// the process environment. Variables already set win.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }
}

impl AppConfig {
    /// Reads configuration from the process environment. Fails without
    /// touching the network when a required variable is missing.
    pub fn from_env() -> Result<Self> {
        let webhook_url = required_var(
            WEBHOOK_URL_VAR,
            "Set it to the incoming webhook URL notifications are posted to.",
        )?;
        let anthropic_api_key =
            required_var(ANTHROPIC_API_KEY_VAR, "Set it to your Anthropic API key.")?;

        let mode = parsed_var::<RenderMode>("TRIAGE_MODE")?.unwrap_or(RenderMode::Digest);
        let (default_query, default_max_results, default_max_tokens) = match mode {
            RenderMode::Filter => (unread_since_yesterday_query(Utc::now()), 50, 2048),
            RenderMode::Digest => (DIGEST_QUERY.to_string(), 100, 4096),
        };

        let credentials_dir = optional_var("TRIAGE_CREDENTIALS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let token_path = optional_var("TRIAGE_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| credentials_dir.join("token.json"));

        Ok(Self {
            mode,
            webhook_url,
            gmail_query: optional_var("TRIAGE_GMAIL_QUERY").unwrap_or(default_query),
            gmail_max_results: parsed_var("TRIAGE_MAX_RESULTS")?.unwrap_or(default_max_results),
            gmail_api_hostname: optional_var("TRIAGE_GMAIL_HOST")
                .unwrap_or_else(|| gmail::DEFAULT_API_HOSTNAME.to_string()),
            credentials_dir,
            token_path,
            anthropic_api_hostname: optional_var("TRIAGE_ANTHROPIC_HOST")
                .unwrap_or_else(|| anthropic::DEFAULT_API_HOSTNAME.to_string()),
            anthropic_api_key,
            anthropic_model: optional_var("TRIAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            anthropic_max_tokens: parsed_var("TRIAGE_MAX_TOKENS")?.unwrap_or(default_max_tokens),
            anthropic_thinking_budget: parsed_var("TRIAGE_THINKING_BUDGET")
                .context("Extended thinking budget must be a number of tokens")?,
        })
    }
}
