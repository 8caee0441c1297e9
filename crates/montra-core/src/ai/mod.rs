//! Completion backend abstraction
//!
//! This module provides a backend-agnostic interface to a hosted chat
//! completion model, plus the pieces built on top of it.
//!
//! # Architecture
//!
//! - `CompletionBackend` trait: one raw completion call, text in, text out
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - `normalize`: the boundary that turns untrusted model text into JSON objects
//! - `extractors`: transaction, receipt and product extraction on top of both
//!
//! The client is constructed explicitly and handed to every extractor and to
//! the assistant; there is no process-wide instance.
//!
//! # Configuration
//!
//! Environment variables (see [`crate::config::AiSettings`]):
//! - `GROQ_API_KEY` / `MONTRA_AI_API_KEY`: API key (AI is unavailable without one)
//! - `MONTRA_AI_HOST`: Server URL (default: https://api.groq.com/openai)
//! - `MONTRA_TEXT_MODEL` / `MONTRA_VISION_MODEL`: model overrides
//! - `AI_BACKEND=mock`: offline mock backend

pub mod extractors;
mod mock;
pub mod normalize;
mod openai_compatible;
pub mod types;

pub use extractors::{Extractor, ProductExtractor, ReceiptExtractor, TransactionExtractor};
pub use mock::{MockBackend, MockReply};
pub use normalize::{normalize, strip_code_fences, JsonObject, ParseError};
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::AiSettings;
use crate::error::Result;

/// Trait defining the interface for all completion backends
///
/// Backends make exactly one outbound call per `complete` and never retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the raw text of the first choice
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model name used for a request kind
    fn model(&self, kind: ModelKind) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Hosted OpenAI-compatible endpoint (Groq by default)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None when no API key is configured, which callers treat as
    /// "AI features unavailable".
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_default();
        if backend.eq_ignore_ascii_case("mock") {
            return Some(AIClient::mock());
        }

        let settings = AiSettings::from_env()?;
        match OpenAICompatibleBackend::from_settings(&settings) {
            Ok(b) => Some(AIClient::OpenAICompatible(b)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build completion client, AI disabled");
                None
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Display name of the backend (for `montra status`-style output)
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl CompletionBackend for AIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.complete(request).await,
            AIClient::Mock(b) => b.complete(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self, kind: ModelKind) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(kind),
            AIClient::Mock(b) => b.model(kind),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
