//! Transaction entry form state
//!
//! Extracted candidates are merged into a draft field by field: a field is
//! only overwritten when the candidate actually carries it, so anything the
//! user already typed survives a partial extraction. Manual entry and AI entry
//! go through the same `validate`.

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::ai::{ReceiptCandidate, TransactionCandidate};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionType};

/// Date layouts accepted from receipts, tried in order
const RECEIPT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

/// An in-progress transaction entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionDraft {
    pub title: String,
    pub amount: Option<f64>,
    pub kind: TransactionType,
    pub category: Option<String>,
    /// Date of the underlying purchase; entry time when absent
    pub date: Option<NaiveDate>,
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the fields a text extraction produced; returns what changed
    pub fn apply_transaction(&mut self, candidate: &TransactionCandidate) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if let Some(ref title) = candidate.title {
            self.title = title.clone();
            applied.push("title");
        }
        if let Some(amount) = candidate.amount {
            self.amount = Some(amount);
            applied.push("amount");
        }
        if let Some(kind) = candidate.kind {
            self.kind = kind;
            applied.push("type");
        }
        applied
    }

    /// Apply the fields a receipt extraction produced; returns what changed
    ///
    /// Receipts are always expenses. A date that does not parse is dropped.
    pub fn apply_receipt(&mut self, candidate: &ReceiptCandidate) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if candidate.is_empty() {
            return applied;
        }
        if let Some(ref title) = candidate.title {
            self.title = title.clone();
            applied.push("title");
        }
        if let Some(amount) = candidate.amount {
            self.amount = Some(amount);
            applied.push("amount");
        }
        if let Some(date) = candidate.date.as_deref().and_then(parse_receipt_date) {
            self.date = Some(date);
            applied.push("date");
        }
        self.kind = TransactionType::Expense;
        applied.push("type");
        applied
    }

    /// Check the draft and build an insertable transaction
    ///
    /// No transaction is ever saved with a blank title or a non-positive amount.
    pub fn validate(&self, uid: &str) -> Result<NewTransaction> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::incomplete("title"));
        }
        let amount = self
            .amount
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or_else(|| Error::incomplete("amount"))?;

        let date = self
            .date
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or_else(Utc::now);

        Ok(NewTransaction {
            uid: uid.to_string(),
            title: title.to_string(),
            amount,
            kind: self.kind,
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            date,
        })
    }
}

/// Parse a free-form receipt date
pub fn parse_receipt_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(date) = RECEIPT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    {
        return Some(date);
    }
    // ISO timestamps ("2024-03-12T18:22:00")
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_apply_only_present_fields() {
        let mut draft = TransactionDraft {
            title: "Groceries at Imtiaz".to_string(),
            amount: None,
            kind: TransactionType::Expense,
            ..Default::default()
        };
        let applied = draft.apply_transaction(&TransactionCandidate {
            title: None,
            amount: Some(2500.0),
            kind: None,
        });
        assert_eq!(applied, vec!["amount"]);
        assert_eq!(draft.title, "Groceries at Imtiaz");
        assert_eq!(draft.amount, Some(2500.0));
    }

    #[test]
    fn test_apply_receipt_threads_date() {
        let mut draft = TransactionDraft::new();
        draft.kind = TransactionType::Income;
        let applied = draft.apply_receipt(&ReceiptCandidate {
            title: Some("Imtiaz".to_string()),
            amount: Some(2340.0),
            date: Some("12/03/2024".to_string()),
        });
        assert_eq!(applied, vec!["title", "amount", "date", "type"]);
        assert_eq!(draft.kind, TransactionType::Expense);
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 12));

        let tx = draft.validate("u1").unwrap();
        assert_eq!(tx.date.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
    }

    #[test]
    fn test_unreadable_receipt_leaves_draft_untouched() {
        let mut draft = TransactionDraft {
            title: "typed by hand".to_string(),
            amount: Some(10.0),
            kind: TransactionType::Income,
            ..Default::default()
        };
        let before = draft.clone();
        assert!(draft.apply_receipt(&ReceiptCandidate::default()).is_empty());
        assert_eq!(draft, before);
    }

    #[test]
    fn test_validate_rejects_blank_title_and_bad_amount() {
        let mut draft = TransactionDraft::new();
        draft.title = "   ".to_string();
        draft.amount = Some(10.0);
        assert!(matches!(
            draft.validate("u1"),
            Err(Error::IncompleteExtraction { ref missing }) if missing == "title"
        ));

        draft.title = " Lunch ".to_string();
        for amount in [None, Some(0.0), Some(-3.0), Some(f64::NAN)] {
            draft.amount = amount;
            assert!(draft.validate("u1").is_err(), "accepted {:?}", amount);
        }

        draft.amount = Some(15.0);
        let tx = draft.validate("u1").unwrap();
        assert_eq!(tx.title, "Lunch");
        assert_eq!(tx.kind, TransactionType::Expense);
        assert_eq!(tx.uid, "u1");
    }

    #[test]
    fn test_parse_receipt_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 12);
        assert_eq!(parse_receipt_date("2024-03-12"), expected);
        assert_eq!(parse_receipt_date("12-03-2024"), expected);
        assert_eq!(parse_receipt_date("Mar 12, 2024"), expected);
        assert_eq!(parse_receipt_date("2024-03-12T18:22:00"), expected);
        // Day-first wins when ambiguous; month-first still parses otherwise
        assert_eq!(parse_receipt_date("03/25/2024").map(|d| d.day()), Some(25));
        assert_eq!(parse_receipt_date("yesterday"), None);
        assert_eq!(parse_receipt_date(""), None);
    }
}
