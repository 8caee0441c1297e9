//! Interactive assistant
//!
//! The transcript lives only for the session. The financial snapshot is
//! recomputed from the ledger before every turn.

use anyhow::Result;
use montra_core::ai::AIClient;
use montra_core::assistant::{Assistant, ChatSession, QUICK_ACTIONS};
use montra_core::Database;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{require_ai, shared_prompts};

/// Run a chat loop over `input` until it ends or the user types "exit"
///
/// A number picks the matching quick action.
pub async fn cmd_chat<R: AsyncBufRead + Unpin>(
    db: &Database,
    uid: &str,
    ai: Option<&AIClient>,
    input: R,
) -> Result<()> {
    let client = require_ai(ai)?;
    let assistant = Assistant::new(client.clone(), shared_prompts());
    let mut session = ChatSession::new();

    if let Some(welcome) = session.messages().first() {
        println!("🤖 {}", welcome.text);
    }
    println!();
    for (i, action) in QUICK_ACTIONS.iter().enumerate() {
        println!("   [{}] {}", i + 1, action);
    }
    println!("   (type \"exit\" to leave)");

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }
        let text = text
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| QUICK_ACTIONS.get(i).copied())
            .unwrap_or(text);

        let snapshot = db.financial_snapshot(uid)?;
        let reply = session.send(&assistant, text, &snapshot).await;
        println!();
        println!("🤖 {}", reply);
        println!();
    }

    Ok(())
}
