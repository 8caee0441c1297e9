//! Conversational assistant
//!
//! The assistant has no memory of its own. Every call sends the transcript
//! so far plus a freshly rendered snapshot of the user's finances as the
//! system preamble. Failures never reach the chat: the caller gets a fixed
//! apology instead.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use crate::ai::{
    AIClient, CompletionBackend, CompletionRequest, CompletionTask, ModelKind, PromptMessage,
    ResponseFormat,
};
use crate::error::{Error, Result};
use crate::fmt::{currency, DEFAULT_CURRENCY};
use crate::models::{ChatMessage, FinancialSnapshot, Sender};
use crate::prompts::{PromptId, PromptLibrary};

/// Shown in place of a reply when the completion call fails
pub const APOLOGY: &str = "Sorry, I'm having trouble connecting right now. Please try again.";

/// First message of every conversation
pub const WELCOME: &str = "Hello! I'm Montra AI. I have access to your transaction history and can help you analyze your spending or plan your budget. How can I help you today?";

/// Suggested openers
pub const QUICK_ACTIONS: &[&str] = &["Analyze spending", "Budgeting tips", "Recent expenses"];

/// Most transcript messages sent per call; older turns are dropped first
pub const MAX_HISTORY_MESSAGES: usize = 40;

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Answers chat turns grounded in the user's own numbers
#[derive(Clone)]
pub struct Assistant {
    client: AIClient,
    prompts: Arc<RwLock<PromptLibrary>>,
    currency: String,
}

impl Assistant {
    pub fn new(client: AIClient, prompts: Arc<RwLock<PromptLibrary>>) -> Self {
        Self {
            client,
            prompts,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, code: &str) -> Self {
        self.currency = code.to_string();
        self
    }

    /// Reply to the last user message in `history`
    ///
    /// Always returns display text; on failure that text is [`APOLOGY`].
    pub async fn respond(&self, history: &[ChatMessage], snapshot: &FinancialSnapshot) -> String {
        match self.try_respond(history, snapshot).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Assistant reply failed");
                APOLOGY.to_string()
            }
        }
    }

    /// Like [`respond`](Self::respond) but surfaces the error
    pub async fn try_respond(
        &self,
        history: &[ChatMessage],
        snapshot: &FinancialSnapshot,
    ) -> Result<String> {
        let request = self.build_request(history, snapshot)?;
        let reply = self.client.complete(&request).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::EmptyCompletion);
        }
        debug!(chars = reply.len(), "Assistant replied");
        Ok(reply.to_string())
    }

    /// The exact request `respond` sends
    pub fn build_request(
        &self,
        history: &[ChatMessage],
        snapshot: &FinancialSnapshot,
    ) -> Result<CompletionRequest> {
        let balance = currency(snapshot.balance, &self.currency);
        let recent = self.render_recent(snapshot);

        let mut vars = HashMap::new();
        vars.insert("currency", self.currency.as_str());
        vars.insert("balance", balance.as_str());
        vars.insert("recent_transactions", recent.as_str());
        if snapshot.recent_transactions.is_empty() {
            vars.insert("extra", "The user has not recorded any transactions yet.");
        }

        let (system_prompt, temperature) = {
            let mut prompts = self
                .prompts
                .write()
                .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
            let prompt = prompts.get(PromptId::Assistant)?;
            (
                prompt.render_system(&vars),
                prompt.metadata.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            )
        };

        let skip = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
        let messages = history
            .iter()
            .skip(skip)
            .map(|m| match m.sender {
                Sender::User => PromptMessage::user(m.text.clone()),
                Sender::Ai => PromptMessage::assistant(m.text.clone()),
            })
            .collect();

        Ok(CompletionRequest {
            task: CompletionTask::Conversation,
            model: ModelKind::Text,
            system_prompt,
            messages,
            image: None,
            temperature,
            response_format: ResponseFormat::Text,
            max_tokens: None,
        })
    }

    fn render_recent(&self, snapshot: &FinancialSnapshot) -> String {
        if snapshot.recent_transactions.is_empty() {
            return "(none)".to_string();
        }
        snapshot
            .recent_transactions
            .iter()
            .map(|tx| {
                format!(
                    "- {} {}: {} ({})",
                    tx.date.format("%Y-%m-%d"),
                    tx.title,
                    currency(tx.amount, &self.currency),
                    tx.kind
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An in-memory, append-only conversation
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// A conversation opened by the welcome message
    pub fn new() -> Self {
        let mut session = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        session.push(Sender::Ai, WELCOME);
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, sender: Sender, text: &str) -> &ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: id.to_string(),
            text: text.to_string(),
            sender,
            timestamp: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Append the user's turn, ask the assistant, append and return its reply
    pub async fn send(
        &mut self,
        assistant: &Assistant,
        text: &str,
        snapshot: &FinancialSnapshot,
    ) -> String {
        self.push(Sender::User, text);
        let reply = assistant.respond(&self.messages, snapshot).await;
        self.push(Sender::Ai, &reply);
        reply
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::ai::{MockBackend, MockReply, Role};
    use crate::models::{Transaction, TransactionType};

    fn assistant(backend: &MockBackend) -> Assistant {
        Assistant::new(
            AIClient::Mock(backend.clone()),
            Arc::new(RwLock::new(PromptLibrary::embedded_only())),
        )
    }

    fn snapshot() -> FinancialSnapshot {
        let tx = |id: i64, title: &str, amount: f64, kind: TransactionType, day: u32| Transaction {
            id,
            uid: "u1".to_string(),
            title: title.to_string(),
            amount,
            kind,
            category: None,
            date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        };
        FinancialSnapshot::from_transactions(&[
            tx(1, "Salary", 15000.0, TransactionType::Income, 1),
            tx(2, "Groceries", 3000.0, TransactionType::Expense, 5),
        ])
    }

    #[tokio::test]
    async fn test_grounding_block_carries_balance() {
        let backend = MockBackend::new();
        let assistant = assistant(&backend);
        let mut session = ChatSession::new();

        let reply = session.send(&assistant, "What's my balance?", &snapshot()).await;
        assert_eq!(reply, "You said: What's my balance?");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        let system = request.system_prompt.as_deref().unwrap();
        assert!(system.contains("PKR 12,000"), "system prompt: {}", system);
        assert!(system.contains("Groceries"));
        assert!(request.temperature > 0.0);
        assert_eq!(request.response_format, ResponseFormat::Text);
        assert_eq!(request.task, CompletionTask::Conversation);
    }

    #[tokio::test]
    async fn test_full_transcript_is_resent_with_roles() {
        let backend = MockBackend::new();
        let assistant = assistant(&backend);
        let mut session = ChatSession::new();

        session.send(&assistant, "Analyze spending", &snapshot()).await;
        session.send(&assistant, "And last week?", &snapshot()).await;

        let second = &backend.requests()[1];
        let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(second.messages[0].content, WELCOME);
        assert_eq!(session.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_failure_returns_apology() {
        let backend = MockBackend::new();
        backend.push_reply(MockReply::Fail(500));
        let assistant = assistant(&backend);
        let mut session = ChatSession::new();

        let reply = session.send(&assistant, "Budgeting tips", &snapshot()).await;
        assert_eq!(reply, APOLOGY);
        // The apology is part of the transcript like any reply
        assert_eq!(session.messages().last().unwrap().text, APOLOGY);

        backend.push_reply(MockReply::Empty);
        assert_eq!(assistant.respond(session.messages(), &snapshot()).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_empty_ledger_is_stated() {
        let backend = MockBackend::new();
        let assistant = assistant(&backend);
        let request = assistant
            .build_request(&ChatSession::new().messages()[..], &FinancialSnapshot::default())
            .unwrap();
        let system = request.system_prompt.unwrap();
        assert!(system.contains("PKR 0"));
        assert!(system.contains("not recorded any transactions"));
    }

    #[test]
    fn test_history_is_bounded() {
        let backend = MockBackend::new();
        let assistant = assistant(&backend);
        let mut session = ChatSession::new();
        for i in 0..60 {
            session.push(Sender::User, &format!("message {}", i));
        }
        let request = assistant.build_request(session.messages(), &snapshot()).unwrap();
        assert_eq!(request.messages.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(request.messages.last().unwrap().content, "message 59");
    }

    #[test]
    fn test_session_starts_with_welcome() {
        let session = ChatSession::new();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender, Sender::Ai);
        assert_eq!(session.messages()[0].text, WELCOME);
        assert_eq!(QUICK_ACTIONS.len(), 3);
    }
}
