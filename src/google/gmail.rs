//! Gmail API client for listing messages and fetching their Subject
//! and From headers. Bodies are never fetched.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::triage::Email;

pub const DEFAULT_API_HOSTNAME: &str = "https://gmail.googleapis.com";

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#(\d+)|#x([0-9a-fA-F]+));").unwrap());

/// Message and header structures from Gmail API documentation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageStub {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageStub>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePayload>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub headers: Option<Vec<MessageHeader>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// Decode HTML entities in a string. Gmail escapes snippets as HTML.
fn html_entity_decode(input: &str) -> String {
    let mut result = input.to_string();

    // Named entities. `&amp;` goes last so `&amp;lt;` stays `&lt;`
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&apos;", "'");
    result = result.replace("&nbsp;", " ");

    // Numeric entities (&#39; or &#x2019;)
    result = NUMERIC_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            let codepoint = match (caps.get(2), caps.get(3)) {
                (Some(decimal), _) => decimal.as_str().parse::<u32>().ok(),
                (None, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
                _ => None,
            };
            match codepoint.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    result.replace("&amp;", "&")
}

/// Flatten smart quotes. Headers come back raw so this is all they get.
fn clean_unicode(content: &str) -> String {
    content
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
}

/// Snippets are HTML escaped, so decode entities first
fn clean_text(content: &str) -> String {
    clean_unicode(&html_entity_decode(content))
}

fn extract_header(message: &Message, name: &str) -> String {
    message
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .and_then(|headers| {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
        })
        .map(|h| clean_unicode(&h.value))
        .unwrap_or_default()
}

/// Extract and clean the subject from a message
pub fn extract_subject(message: &Message) -> String {
    extract_header(message, "subject")
}

/// Extract and clean the from field from a message
pub fn extract_from(message: &Message) -> String {
    extract_header(message, "from")
}

pub fn extract_snippet(message: &Message) -> String {
    message
        .snippet
        .as_deref()
        .map(clean_text)
        .unwrap_or_default()
}

/// Query for unread mail received in the last day. Gmail's `after:`
/// only has day granularity.
pub fn unread_since_yesterday_query(now: DateTime<Utc>) -> String {
    let since = (now - Duration::hours(24)).format("%Y/%m/%d");
    format!("is:unread after:{}", since)
}

/// Read side of a mailbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Message ids matching `query`, newest first, at most `max_results`.
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageStub>>;

    /// Metadata (Subject, From, snippet) for one message.
    async fn get_metadata(&self, id: &str) -> Result<Message>;
}

pub struct GmailClient {
    client: Client,
    api_hostname: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(api_hostname: &str, access_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageStub>> {
        let url = format!("{}/gmail/v1/users/me/messages", self.api_hostname);
        let res = self
            .client
            .get(&url)
            .query(&[("q", query), ("maxResults", &max_results.to_string())])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Message list failed: {} ({})", status, text);
        }
        let msgs: ListMessagesResponse = serde_json::from_str(&text)?;
        Ok(msgs.messages.unwrap_or_default())
    }

    async fn get_metadata(&self, id: &str) -> Result<Message> {
        let url = format!("{}/gmail/v1/users/me/messages/{}", self.api_hostname, id);
        let res = self
            .client
            .get(&url)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Message fetch failed for {}: {} ({})", id, status, text);
        }
        let message: Message = serde_json::from_str(&text)?;
        Ok(message)
    }
}

/// Lists messages matching `query` and fetches metadata for each one,
/// one at a time, preserving the listing order.
pub async fn fetch_emails(
    mailbox: &dyn Mailbox,
    query: &str,
    max_results: u32,
) -> Result<Vec<Email>> {
    let stubs = mailbox
        .list_messages(query, max_results)
        .await
        .with_context(|| format!("Failed to list messages for query '{}'", query))?;
    tracing::debug!("Listed {} messages for query '{}'", stubs.len(), query);

    let mut emails = Vec::with_capacity(stubs.len());
    for stub in stubs {
        let message = mailbox.get_metadata(&stub.id).await?;
        emails.push(Email::new(
            &stub.id,
            &extract_subject(&message),
            &extract_from(&message),
            &extract_snippet(&message),
        ));
    }

    Ok(emails)
}
