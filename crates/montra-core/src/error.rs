//! Error types for Montra

use thiserror::Error;

use crate::ai::normalize::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Completion API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion returned no content")]
    EmptyCompletion,

    #[error("AI features unavailable: no API key configured")]
    AiUnavailable,

    #[error("Malformed model output: {0}")]
    MalformedOutput(#[from] ParseError),

    #[error("Incomplete extraction: missing {missing}")]
    IncompleteExtraction { missing: String },

    #[error("No price found for {product}: {reason}")]
    ScrapeMiss { product: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Shorthand for an incomplete extraction naming the missing field
    pub fn incomplete(missing: impl Into<String>) -> Self {
        Error::IncompleteExtraction {
            missing: missing.into(),
        }
    }

    /// Whether a human re-triggering the action might succeed
    ///
    /// Nothing in this crate retries automatically.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout(_) | Error::EmptyCompletion => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Text suitable for showing to an end user
    ///
    /// Malformed output and incomplete extraction both mean "no usable record"
    /// to the caller, so they share one message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::MalformedOutput(_) | Error::IncompleteExtraction { .. } => {
                "Could not understand that. Please try again or enter it manually."
            }
            Error::AiUnavailable => "AI features are unavailable. You can still enter it manually.",
            e if e.is_transient() => "The AI service could not be reached. Please try again.",
            Error::Api { .. } => "The AI service rejected the request. Please try again later.",
            _ => "Something went wrong. Please try again.",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
