//! Mock backend for testing
//!
//! Answers every task with a predictable response, or with replies scripted
//! by a test. Every request is recorded so tests can inspect what would have
//! been sent to the completion endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::types::{CompletionRequest, CompletionTask, ModelKind};
use super::CompletionBackend;

/// A scripted reply for the next completion call
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Raw completion text
    Text(String),
    /// Fail with an API error of this status
    Fail(u16),
    /// Fail with an empty completion
    Empty,
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend whose every call fails
    pub fn failing() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Queue a reply; queued replies are used before the built-in answers
    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Queue a raw text reply
    pub fn reply_with(&self, text: impl Into<String>) -> &Self {
        self.push_reply(MockReply::Text(text.into()));
        self
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of completion calls received so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.replies.lock().ok().and_then(|mut r| r.pop_front())
    }
}

/// Built-in answer for a task
fn default_answer(request: &CompletionRequest) -> String {
    let input = request.last_user_text().unwrap_or_default();
    match request.task {
        CompletionTask::ParseTransaction => mock_transaction(input),
        CompletionTask::ParseReceipt => json!({
            "title": "Imtiaz Super Market",
            "amount": 2340,
            "date": "2024-03-12",
            "type": "expense"
        })
        .to_string(),
        CompletionTask::ParseProduct => json!({
            "name": "Itel Super S26 Ultra",
            "price": 44999,
            "image": "https://images.priceoye.pk/itel-super-s26-ultra-pakistan-priceoye-jg2my-500x500.webp"
        })
        .to_string(),
        CompletionTask::Conversation => format!("You said: {}", input),
    }
}

/// Rough parse of notes like "Lunch $15" or "Salary 50000"
fn mock_transaction(input: &str) -> String {
    let mut title_words = Vec::new();
    let mut amount: Option<f64> = None;

    for word in input.split_whitespace() {
        let digits: String = word
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        match digits.parse::<f64>() {
            Ok(value) if amount.is_none() => amount = Some(value),
            _ if digits.is_empty() => title_words.push(word),
            _ => {}
        }
    }

    let lower = input.to_lowercase();
    let kind = if ["salary", "received", "income", "refund", "bonus"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "income"
    } else {
        "expense"
    };

    json!({
        "title": title_words.join(" "),
        "amount": amount,
        "type": kind,
    })
    .to_string()
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if !self.healthy {
            return Err(Error::Api {
                status: 503,
                body: "mock backend unavailable".to_string(),
            });
        }

        match self.next_reply() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(status)) => Err(Error::Api {
                status,
                body: "scripted failure".to_string(),
            }),
            Some(MockReply::Empty) => Err(Error::EmptyCompletion),
            None => Ok(default_answer(request)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Text => "mock-text",
            ModelKind::Vision => "mock-vision",
        }
    }

    fn host(&self) -> &str {
        "mock://"
    }
}
