//! Recording fakes for the pipeline's collaborators
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

use inbox_triage::anthropic::{ContentBlock, LanguageModel, MessagesResponse};
use inbox_triage::google::gmail::{Mailbox, Message, MessageHeader, MessagePayload, MessageStub};
use inbox_triage::notify::Notifier;

/// Serves a fixed list of (id, subject, from, snippet) messages.
pub struct FakeMailbox {
    messages: Vec<(String, String, String, String)>,
    pub calls: Arc<Mutex<usize>>,
}

impl FakeMailbox {
    pub fn new(messages: &[(&str, &str, &str, &str)]) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|(id, subject, from, snippet)| {
                    (id.to_string(), subject.to_string(), from.to_string(), snippet.to_string())
                })
                .collect(),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn list_messages(&self, _query: &str, max_results: u32) -> Result<Vec<MessageStub>> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .messages
            .iter()
            .take(max_results as usize)
            .map(|(id, ..)| MessageStub {
                id: id.clone(),
                thread_id: format!("thr_{}", id),
            })
            .collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<Message> {
        *self.calls.lock().unwrap() += 1;
        let (id, subject, from, snippet) = self
            .messages
            .iter()
            .find(|(message_id, ..)| message_id == id)
            .ok_or(anyhow!("No message {}", id))?;
        Ok(Message {
            id: id.clone(),
            thread_id: format!("thr_{}", id),
            snippet: Some(snippet.clone()),
            payload: Some(MessagePayload {
                headers: Some(vec![
                    MessageHeader {
                        name: "Subject".to_string(),
                        value: subject.clone(),
                    },
                    MessageHeader {
                        name: "From".to_string(),
                        value: from.clone(),
                    },
                ]),
            }),
            label_ids: None,
        })
    }
}

/// Answers every prompt with the same content blocks.
pub struct FakeModel {
    blocks: Vec<ContentBlock>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeModel {
    pub fn text(text: &str) -> Self {
        Self::blocks(vec![ContentBlock::text(text)])
    }

    pub fn blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> Result<MessagesResponse, Error> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(MessagesResponse::from_blocks(self.blocks.clone()))
    }
}

/// Records delivered notifications, optionally failing instead.
#[derive(Default)]
pub struct FakeNotifier {
    pub delivered: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn deliver(&self, text: &str) -> Result<(), Error> {
        self.delivered.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("Webhook delivery failed: 500 Internal Server Error"));
        }
        Ok(())
    }
}

/// Builds a JSON score array for the given priorities.
pub fn scores_json(priorities: &[i64], with_action: bool) -> String {
    let scores: Vec<serde_json::Value> = priorities
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut score = serde_json::json!({
                "index": i + 1,
                "priority": p,
                "reason": format!("reason {}", i + 1),
            });
            if with_action {
                score["action_needed"] = serde_json::json!(*p >= 4);
            }
            score
        })
        .collect();
    serde_json::to_string(&scores).unwrap()
}
