//! Minimal client for the Anthropic Messages API. Only what a single
//! non-streaming user turn needs.

use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const DEFAULT_API_HOSTNAME: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// One block of an assistant response. Thinking blocks are returned
/// when extended thinking is enabled and carry no answer content.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },

    #[serde(rename = "redacted_thinking")]
    RedactedThinking { data: String },

    // Tool use and anything newer
    #[serde(other)]
    Other,
}

impl ContentBlock {
    pub fn text(text: &str) -> Self {
        ContentBlock::Text {
            text: text.to_string(),
        }
    }

    pub fn thinking(thinking: &str) -> Self {
        ContentBlock::Thinking {
            thinking: thinking.to_string(),
            signature: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content,
            stop_reason: None,
            usage: None,
        }
    }
}

/// Anything that can answer a single prompt with a list of content
/// blocks.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<MessagesResponse, Error>;
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_hostname: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    thinking_budget: Option<u32>,
}

impl AnthropicClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str, max_tokens: u32) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            thinking_budget: None,
        }
    }

    /// Enables extended thinking. The API requires `max_tokens` to be
    /// larger than the budget so it is raised if needed.
    pub fn thinking_budget(mut self, budget_tokens: Option<u32>) -> Self {
        if let Some(budget) = budget_tokens
            && self.max_tokens <= budget
        {
            self.max_tokens = budget.saturating_add(1024);
        }
        self.thinking_budget = budget_tokens;
        self
    }

    fn payload(&self, prompt: &str) -> Value {
        let mut payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(budget) = self.thinking_budget {
            payload["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
        }
        payload
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<MessagesResponse, Error> {
        let url = format!("{}/v1/messages", self.api_hostname.trim_end_matches('/'));
        let res = reqwest::Client::new()
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(&self.payload(prompt))
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Messages request failed: {} ({})", status, text);
        }
        let response: MessagesResponse = serde_json::from_str(&text)?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Messages request completed"
            );
        }
        Ok(response)
    }
}
