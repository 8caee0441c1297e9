//! Completion request types and extraction candidates
//!
//! These types are backend-agnostic and used across all AI implementations.
//! Candidates hold only what the model actually produced: every field is
//! optional and a missing field means "not extracted", never zero or empty.

use base64::Engine;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    ParsedProduct, ParsedReceipt, ParsedTransaction, TransactionType, PLACEHOLDER_IMAGE,
};

use super::normalize::{number_field, string_field, JsonObject};

/// What a completion call is for (used for logging and mock routing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionTask {
    ParseTransaction,
    ParseReceipt,
    ParseProduct,
    Conversation,
}

impl CompletionTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseTransaction => "parse_transaction",
            Self::ParseReceipt => "parse_receipt",
            Self::ParseProduct => "parse_product",
            Self::Conversation => "conversation",
        }
    }
}

/// Which configured model variant serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Chat model for text-only extraction and conversation
    Text,
    /// Vision-capable model for image inputs
    Vision,
}

/// Desired shape of the completion output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn of a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An image sent inline with a request
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }

    /// Guess the MIME type from a file extension, defaulting to JPEG
    pub fn from_path_bytes(path: &std::path::Path, bytes: Vec<u8>) -> Self {
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            _ => "image/jpeg",
        };
        Self {
            bytes,
            mime_type: mime_type.to_string(),
        }
    }

    /// Inline base64 data URL
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// A single completion call
///
/// When `image` is set it is attached to the last user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub task: CompletionTask,
    pub model: ModelKind,
    pub system_prompt: Option<String>,
    pub messages: Vec<PromptMessage>,
    pub image: Option<ImagePayload>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Last user-authored text in the request
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Transaction fields the model produced from free text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionCandidate {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub kind: Option<TransactionType>,
}

impl TransactionCandidate {
    pub fn from_object(obj: &JsonObject) -> Self {
        Self {
            title: string_field(obj, &["title", "description"]),
            amount: number_field(obj, &["amount"]),
            kind: string_field(obj, &["type"]).and_then(|t| t.parse().ok()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.amount.is_none() && self.kind.is_none()
    }

    /// Validate into a complete transaction
    ///
    /// Title and a positive amount are required; a missing type means expense.
    pub fn into_transaction(self) -> Result<ParsedTransaction> {
        let title = self.title.ok_or_else(|| Error::incomplete("title"))?;
        let amount = self
            .amount
            .filter(|a| *a > 0.0)
            .ok_or_else(|| Error::incomplete("amount"))?;
        Ok(ParsedTransaction {
            title,
            amount,
            kind: self.kind.unwrap_or_default(),
        })
    }
}

/// Receipt fields the model read off an image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptCandidate {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
}

impl ReceiptCandidate {
    pub fn from_object(obj: &JsonObject) -> Self {
        Self {
            title: string_field(obj, &["title", "store", "merchant"]),
            amount: number_field(obj, &["amount", "total"]),
            date: string_field(obj, &["date"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.amount.is_none() && self.date.is_none()
    }

    /// Validate into a receipt; receipts are always expenses
    pub fn into_receipt(self) -> Result<ParsedReceipt> {
        let title = self.title.ok_or_else(|| Error::incomplete("title"))?;
        let amount = self
            .amount
            .filter(|a| *a > 0.0)
            .ok_or_else(|| Error::incomplete("amount"))?;
        Ok(ParsedReceipt {
            title,
            amount,
            date: self.date,
            kind: TransactionType::Expense,
        })
    }
}

/// Product fields the model found in a page's HTML
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCandidate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
}

impl ProductCandidate {
    pub fn from_object(obj: &JsonObject) -> Self {
        Self {
            name: string_field(obj, &["name", "title"]),
            price: number_field(obj, &["price"]),
            image: string_field(obj, &["image", "image_url", "imageUrl"])
                .filter(|url| is_absolute_url(url)),
        }
    }

    /// Validate into a product
    ///
    /// A product without a positive price is useless as a goal, so it fails
    /// outright instead of defaulting to zero.
    pub fn into_product(self) -> Result<ParsedProduct> {
        let name = self.name.ok_or_else(|| Error::incomplete("name"))?;
        let price = self
            .price
            .filter(|p| *p > 0.0)
            .ok_or_else(|| Error::incomplete("price"))?;
        Ok(ParsedProduct {
            name,
            price,
            image: self.image.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        })
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::normalize::normalize;

    #[test]
    fn test_transaction_candidate_from_object() {
        let obj = normalize(r#"{"title": "Lunch", "amount": 15, "type": "expense"}"#).unwrap();
        let candidate = TransactionCandidate::from_object(&obj);
        assert_eq!(candidate.title.as_deref(), Some("Lunch"));
        assert_eq!(candidate.amount, Some(15.0));
        assert_eq!(candidate.kind, Some(TransactionType::Expense));

        let tx = candidate.into_transaction().unwrap();
        assert_eq!(tx.title, "Lunch");
        assert_eq!(tx.amount, 15.0);
    }

    #[test]
    fn test_transaction_candidate_rejects_missing_fields() {
        let no_amount = TransactionCandidate {
            title: Some("Lunch".into()),
            ..Default::default()
        };
        assert!(matches!(
            no_amount.into_transaction(),
            Err(Error::IncompleteExtraction { ref missing }) if missing == "amount"
        ));

        let no_title = TransactionCandidate {
            amount: Some(15.0),
            ..Default::default()
        };
        assert!(no_title.into_transaction().is_err());

        let zero = TransactionCandidate {
            title: Some("Lunch".into()),
            amount: Some(0.0),
            kind: None,
        };
        assert!(zero.into_transaction().is_err());

        let negative = TransactionCandidate {
            title: Some("Lunch".into()),
            amount: Some(-5.0),
            kind: None,
        };
        assert!(negative.into_transaction().is_err());
    }

    #[test]
    fn test_unknown_type_is_not_extracted() {
        let obj = normalize(r#"{"title": "Gift", "amount": 10, "type": "transfer"}"#).unwrap();
        let candidate = TransactionCandidate::from_object(&obj);
        assert_eq!(candidate.kind, None);
    }

    #[test]
    fn test_receipt_candidate_null_fields() {
        let obj = normalize(r#"{"title": null, "amount": null, "date": null, "type": "expense"}"#)
            .unwrap();
        let candidate = ReceiptCandidate::from_object(&obj);
        assert!(candidate.is_empty());
        assert!(candidate.into_receipt().is_err());
    }

    #[test]
    fn test_receipt_is_always_expense() {
        let obj = normalize(
            r#"{"title": "Imtiaz", "amount": "2,340.50", "date": "12/03/2024", "type": "income"}"#,
        )
        .unwrap();
        let receipt = ReceiptCandidate::from_object(&obj).into_receipt().unwrap();
        assert_eq!(receipt.kind, TransactionType::Expense);
        assert_eq!(receipt.amount, 2340.5);
        assert_eq!(receipt.date.as_deref(), Some("12/03/2024"));
    }

    #[test]
    fn test_product_candidate_placeholder_image() {
        let obj = normalize(r#"{"name": "Tecno Spark Go 1", "price": 39999, "image": "/img/a.webp"}"#)
            .unwrap();
        let product = ProductCandidate::from_object(&obj).into_product().unwrap();
        assert_eq!(product.image, PLACEHOLDER_IMAGE);
        assert_eq!(product.price, 39999.0);
    }

    #[test]
    fn test_product_candidate_without_price_fails() {
        let obj = normalize(r#"{"name": "Tecno Spark Go 1", "price": 0}"#).unwrap();
        assert!(ProductCandidate::from_object(&obj).into_product().is_err());

        let obj = normalize(r#"{"name": "Tecno Spark Go 1"}"#).unwrap();
        assert!(ProductCandidate::from_object(&obj).into_product().is_err());
    }

    #[test]
    fn test_image_data_url() {
        let image = ImagePayload::jpeg(b"abc".to_vec());
        assert_eq!(image.data_url(), "data:image/jpeg;base64,YWJj");

        let png = ImagePayload::from_path_bytes(std::path::Path::new("r.PNG"), vec![]);
        assert_eq!(png.mime_type, "image/png");
    }
}
