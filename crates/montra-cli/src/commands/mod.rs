//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and status, plus shared utilities (open_db, load_catalog)
//! - `transactions` - Manual entry, note parsing, receipts, listing, snapshot
//! - `goals` - Savings goals from product pages
//! - `market` - Price discovery and catalog maintenance
//! - `chat` - Interactive assistant
//! - `prompts` - Prompt library management

pub mod chat;
pub mod core;
pub mod goals;
pub mod market;
pub mod prompts;
pub mod transactions;

// Re-export command functions for main.rs
pub use chat::*;
pub use self::core::*;
pub use goals::*;
pub use market::*;
pub use prompts::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
