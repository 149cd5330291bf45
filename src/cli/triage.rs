use anyhow::{Context, Result};
use chrono::Local;

use crate::anthropic::AnthropicClient;
use crate::core::AppConfig;
use crate::google::gmail::GmailClient;
use crate::google::oauth;
use crate::notify::WebhookNotifier;
use crate::triage::{Pipeline, Scorer};

pub async fn run() -> Result<()> {
    // Configuration problems surface here, before any network call
    let config = AppConfig::from_env()?;
    tracing::info!(mode = %config.mode, model = %config.anthropic_model, "Starting triage run");

    println!("Authenticating with Gmail…");
    let access_token = oauth::access_token(&config.token_path, &config.credentials_dir)
        .await
        .context("Gmail authentication failed")?;

    let mailbox = GmailClient::new(&config.gmail_api_hostname, &access_token);
    let model = AnthropicClient::new(
        &config.anthropic_api_hostname,
        &config.anthropic_api_key,
        &config.anthropic_model,
        config.anthropic_max_tokens,
    )
    .thinking_budget(config.anthropic_thinking_budget);
    let scorer = Scorer::new(Box::new(model), config.mode.schema());
    let notifier = WebhookNotifier::new(&config.webhook_url);

    let pipeline = Pipeline {
        mailbox: &mailbox,
        scorer: &scorer,
        notifier: &notifier,
        mode: config.mode,
        query: &config.gmail_query,
        max_results: config.gmail_max_results,
    };
    let outcome = pipeline.run(Local::now().date_naive()).await?;
    tracing::info!(?outcome, "Triage run finished");

    Ok(())
}
