//! Transaction command implementations
//!
//! Manual entry and AI entry end in the same place: a `TransactionDraft`
//! validated and inserted by `save_draft`.

use std::path::Path;

use anyhow::{Context, Result};
use montra_core::ai::{AIClient, Extractor, ImagePayload, ReceiptExtractor, TransactionExtractor};
use montra_core::fmt::{currency, DEFAULT_CURRENCY};
use montra_core::merge::{parse_receipt_date, TransactionDraft};
use montra_core::models::TransactionType;
use montra_core::{Database, Error};

use super::{require_ai, shared_prompts, truncate};

fn show_draft(draft: &TransactionDraft) {
    println!("   Title:  {}", if draft.title.is_empty() { "-" } else { draft.title.as_str() });
    match draft.amount {
        Some(amount) => println!("   Amount: {}", currency(amount, DEFAULT_CURRENCY)),
        None => println!("   Amount: -"),
    }
    println!("   Type:   {}", draft.kind);
    if let Some(date) = draft.date {
        println!("   Date:   {}", date);
    }
}

fn save_draft(db: &Database, uid: &str, draft: &TransactionDraft) -> Result<i64> {
    let tx = draft
        .validate(uid)
        .map_err(|e| {
            let message = e.user_message();
            anyhow::Error::new(e).context(message)
        })?;
    let id = db.insert_transaction(&tx).context("Failed to save transaction")?;
    println!("✅ Saved transaction #{}", id);
    Ok(id)
}

fn extraction_failed(e: Error) -> anyhow::Error {
    let message = format!(
        "{} (manual entry: montra add <title> <amount>)",
        e.user_message()
    );
    anyhow::Error::new(e).context(message)
}

/// Add a transaction by hand
pub fn cmd_add(
    db: &Database,
    uid: &str,
    title: &str,
    amount: f64,
    kind: &str,
    category: Option<String>,
    date: Option<&str>,
) -> Result<()> {
    let kind: TransactionType = kind.parse().map_err(anyhow::Error::msg)?;
    let date = match date {
        Some(raw) => Some(
            parse_receipt_date(raw)
                .with_context(|| format!("Could not read date '{}', expected YYYY-MM-DD", raw))?,
        ),
        None => None,
    };

    let draft = TransactionDraft {
        title: title.to_string(),
        amount: Some(amount),
        kind,
        category,
        date,
    };
    save_draft(db, uid, &draft)?;
    Ok(())
}

/// Turn a note into a draft and optionally save it
pub async fn cmd_parse(
    db: &Database,
    uid: &str,
    ai: Option<&AIClient>,
    text: &str,
    save: bool,
) -> Result<()> {
    let client = require_ai(ai)?;
    let extractor = TransactionExtractor::new(client.clone(), shared_prompts());

    println!("🤖 Reading \"{}\"...", truncate(text, 60));
    let candidate = extractor.extract(text).await.map_err(extraction_failed)?;
    if candidate.is_empty() {
        return Err(extraction_failed(Error::incomplete("title")));
    }

    let mut draft = TransactionDraft::new();
    draft.apply_transaction(&candidate);
    show_draft(&draft);

    if save {
        save_draft(db, uid, &draft)?;
    } else {
        println!();
        println!("   Run again with --save to record it.");
    }
    Ok(())
}

/// Read a receipt photo into a draft and optionally save it
pub async fn cmd_receipt(
    db: &Database,
    uid: &str,
    ai: Option<&AIClient>,
    file: &Path,
    save: bool,
) -> Result<()> {
    let client = require_ai(ai)?;
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read receipt image {}", file.display()))?;
    let image = ImagePayload::from_path_bytes(file, bytes);
    let extractor = ReceiptExtractor::new(client.clone(), shared_prompts());

    println!("🧾 Reading receipt {}...", file.display());
    let candidate = extractor.extract(&image).await.map_err(extraction_failed)?;

    let mut draft = TransactionDraft::new();
    if draft.apply_receipt(&candidate).is_empty() {
        return Err(extraction_failed(Error::incomplete("title")));
    }
    show_draft(&draft);
    if let Some(raw) = candidate.date.as_deref() {
        if draft.date.is_none() {
            println!("   (receipt date '{}' not understood, using today)", raw);
        }
    }

    if save {
        save_draft(db, uid, &draft)?;
    } else {
        println!();
        println!("   Run again with --save to record it.");
    }
    Ok(())
}

pub fn cmd_transactions_list(db: &Database, uid: &str, limit: i64) -> Result<()> {
    let transactions = db.list_recent_transactions(uid, limit)?;

    if transactions.is_empty() {
        println!("No transactions found. Add one with:");
        println!("  montra parse \"Lunch 1500\" --save");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.kind {
            TransactionType::Expense => format!(
                "\x1b[31m-{}\x1b[0m",
                currency(tx.amount, DEFAULT_CURRENCY)
            ),
            TransactionType::Income => format!(
                "\x1b[32m+{}\x1b[0m",
                currency(tx.amount, DEFAULT_CURRENCY)
            ),
        };

        println!(
            "   {} │ {:>16} │ {}",
            tx.date.format("%Y-%m-%d"),
            amount_str,
            truncate(&tx.title, 40)
        );
    }

    Ok(())
}

pub fn cmd_snapshot(db: &Database, uid: &str) -> Result<()> {
    let snapshot = db.financial_snapshot(uid)?;

    println!();
    println!("💰 Balance: {}", currency(snapshot.balance, DEFAULT_CURRENCY));
    if snapshot.recent_transactions.is_empty() {
        println!("   No transactions yet.");
        return Ok(());
    }

    println!();
    println!("   Most recent:");
    for tx in &snapshot.recent_transactions {
        println!(
            "   {} {:<8} {:>14}  {}",
            tx.date.format("%Y-%m-%d"),
            tx.kind.as_str(),
            currency(tx.amount, DEFAULT_CURRENCY),
            truncate(&tx.title, 40)
        );
    }
    Ok(())
}
