//! Montra Core Library
//!
//! The AI-assisted ingestion pipeline of the Montra expense tracker:
//! - Completion client for a hosted chat-completions API (text and vision)
//! - Output normalizer turning model text into JSON objects
//! - Transaction, receipt and product extractors
//! - Transaction draft merge and validation (the same path as manual entry)
//! - Price discovery over a live market catalog
//! - Catalog refresh job with layered price strategies
//! - Conversational assistant grounded in a financial snapshot
//! - SQLite storage and a prompt library with user overrides

pub mod ai;
pub mod assistant;
pub mod catalog;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod fmt;
pub mod merge;
pub mod models;
pub mod prompts;
pub mod store;

/// Test utilities including mock completion and shop servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIClient, CompletionBackend, CompletionRequest, Extractor, ImagePayload, MockBackend,
    OpenAICompatibleBackend, ProductCandidate, ProductExtractor, ReceiptCandidate,
    ReceiptExtractor, TransactionCandidate, TransactionExtractor,
};
pub use assistant::{Assistant, ChatSession};
pub use catalog::{
    CancellationFlag, CatalogRefreshJob, HttpBrowserLauncher, PriceResolver, RefreshReport,
};
pub use config::{AiSettings, CatalogConfig};
pub use db::Database;
pub use discovery::{DiscoveryFeed, DiscoverySubscription, PriceDiscovery};
pub use error::{Error, Result};
pub use merge::TransactionDraft;
pub use models::*;
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use store::{CatalogStore, MemoryCatalog, ProductQuery};
