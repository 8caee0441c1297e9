//! Structured extraction from free text, receipt images and product pages
//!
//! All three extractors share one contract: build a strict prompt, make one
//! completion call at temperature 0, normalize the raw text, and map the
//! decoded object into a candidate whose fields are all optional. Turning a
//! candidate into a record (and rejecting incomplete ones) is a separate,
//! explicit step.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ParsedProduct, ParsedReceipt, ParsedTransaction};
use crate::prompts::{PromptId, PromptLibrary};

use super::normalize::{normalize, JsonObject};
use super::types::{
    CompletionRequest, CompletionTask, ImagePayload, ModelKind, ProductCandidate, PromptMessage,
    ReceiptCandidate, ResponseFormat, TransactionCandidate,
};
use super::{AIClient, CompletionBackend};

/// Character budget for page markup sent to the model; the rest is dropped
pub const MAX_HTML_CHARS: usize = 15_000;

/// One input modality turned into a candidate record
#[async_trait]
pub trait Extractor: Send + Sync {
    type Input: ?Sized + Sync;
    type Candidate: Send;

    /// Run the model and decode its answer into a candidate
    async fn extract(&self, input: &Self::Input) -> Result<Self::Candidate>;
}

/// Client and prompts shared by every extractor
#[derive(Clone)]
struct Extraction {
    client: AIClient,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl Extraction {
    /// Render (system, user) for a prompt; the lock is released before any await
    fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let prompt = prompts.get(id)?;
        Ok((prompt.render_system(vars), prompt.render_user(vars)))
    }

    async fn run(
        &self,
        task: CompletionTask,
        model: ModelKind,
        prompt: (Option<String>, String),
        image: Option<ImagePayload>,
    ) -> Result<JsonObject> {
        let (system_prompt, user) = prompt;
        let request = CompletionRequest {
            task,
            model,
            system_prompt,
            messages: vec![PromptMessage::user(user)],
            image,
            temperature: 0.0,
            response_format: ResponseFormat::JsonObject,
            max_tokens: None,
        };

        let raw = self.client.complete(&request).await.map_err(|e| {
            warn!(task = task.as_str(), error = %e, "Completion failed");
            e
        })?;
        debug!(task = task.as_str(), "Model response: {}", raw);

        normalize(&raw).map_err(|e| {
            warn!(task = task.as_str(), error = %e, "Model output was not a JSON object");
            Error::MalformedOutput(e)
        })
    }
}

/// Free text note to {title, amount, type}
#[derive(Clone)]
pub struct TransactionExtractor {
    inner: Extraction,
}

impl TransactionExtractor {
    pub fn new(client: AIClient, prompts: Arc<RwLock<PromptLibrary>>) -> Self {
        Self {
            inner: Extraction { client, prompts },
        }
    }

    /// Extract and validate in one step
    pub async fn parse(&self, text: &str) -> Result<ParsedTransaction> {
        self.extract(text).await?.into_transaction()
    }
}

#[async_trait]
impl Extractor for TransactionExtractor {
    type Input = str;
    type Candidate = TransactionCandidate;

    async fn extract(&self, text: &str) -> Result<TransactionCandidate> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TransactionCandidate::default());
        }

        let mut vars = HashMap::new();
        vars.insert("input", text);
        let prompt = self.inner.render(PromptId::ParseTransaction, &vars)?;

        let obj = self
            .inner
            .run(CompletionTask::ParseTransaction, ModelKind::Text, prompt, None)
            .await?;
        Ok(TransactionCandidate::from_object(&obj))
    }
}

/// Receipt photo to {title, amount, date}
#[derive(Clone)]
pub struct ReceiptExtractor {
    inner: Extraction,
}

impl ReceiptExtractor {
    pub fn new(client: AIClient, prompts: Arc<RwLock<PromptLibrary>>) -> Self {
        Self {
            inner: Extraction { client, prompts },
        }
    }

    pub async fn parse(&self, image: &ImagePayload) -> Result<ParsedReceipt> {
        self.extract(image).await?.into_receipt()
    }
}

#[async_trait]
impl Extractor for ReceiptExtractor {
    type Input = ImagePayload;
    type Candidate = ReceiptCandidate;

    async fn extract(&self, image: &ImagePayload) -> Result<ReceiptCandidate> {
        if image.bytes.is_empty() {
            return Err(Error::InvalidData("Receipt image is empty".into()));
        }

        let prompt = self.inner.render(PromptId::ParseReceipt, &HashMap::new())?;
        let obj = self
            .inner
            .run(
                CompletionTask::ParseReceipt,
                ModelKind::Vision,
                prompt,
                Some(image.clone()),
            )
            .await?;
        Ok(ReceiptCandidate::from_object(&obj))
    }
}

/// Product page markup to {name, price, image}
#[derive(Clone)]
pub struct ProductExtractor {
    inner: Extraction,
}

impl ProductExtractor {
    pub fn new(client: AIClient, prompts: Arc<RwLock<PromptLibrary>>) -> Self {
        Self {
            inner: Extraction { client, prompts },
        }
    }

    /// Extract and validate; a product without a price is a failure
    pub async fn parse(&self, html: &str) -> Result<ParsedProduct> {
        self.extract(html).await?.into_product()
    }
}

#[async_trait]
impl Extractor for ProductExtractor {
    type Input = str;
    type Candidate = ProductCandidate;

    async fn extract(&self, html: &str) -> Result<ProductCandidate> {
        let snippet = truncate_chars(html, MAX_HTML_CHARS);
        if snippet.len() < html.len() {
            debug!(
                original = html.len(),
                kept = snippet.len(),
                "Truncated product markup"
            );
        }

        let mut vars = HashMap::new();
        vars.insert("html", snippet);
        let prompt = self.inner.render(PromptId::ParseProduct, &vars)?;

        let obj = self
            .inner
            .run(CompletionTask::ParseProduct, ModelKind::Text, prompt, None)
            .await?;
        Ok(ProductCandidate::from_object(&obj))
    }
}

/// First `max` characters of `s`, never splitting a character
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockReply};
    use crate::models::{TransactionType, PLACEHOLDER_IMAGE};

    fn prompts() -> Arc<RwLock<PromptLibrary>> {
        Arc::new(RwLock::new(PromptLibrary::embedded_only()))
    }

    fn mock() -> (MockBackend, AIClient) {
        let backend = MockBackend::new();
        (backend.clone(), AIClient::Mock(backend))
    }

    #[tokio::test]
    async fn test_transaction_lunch() {
        let (_, client) = mock();
        let extractor = TransactionExtractor::new(client, prompts());
        let tx = extractor.parse("Lunch $15").await.unwrap();
        assert_eq!(tx.title, "Lunch");
        assert_eq!(tx.amount, 15.0);
        assert_eq!(tx.kind, TransactionType::Expense);
    }

    #[tokio::test]
    async fn test_transaction_request_shape() {
        let (backend, client) = mock();
        let extractor = TransactionExtractor::new(client, prompts());
        extractor.extract("Taxi 500").await.unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.task, CompletionTask::ParseTransaction);
        assert_eq!(request.model, ModelKind::Text);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.response_format, ResponseFormat::JsonObject);
        assert_eq!(request.last_user_text(), Some("Taxi 500"));
        assert!(request
            .system_prompt
            .as_deref()
            .is_some_and(|s| s.contains("income")));
    }

    #[tokio::test]
    async fn test_fenced_reply_is_normalized() {
        let (backend, client) = mock();
        backend.reply_with(
            "Sure! ```json\n{\"title\":\"Taxi\",\"amount\":500,\"type\":\"expense\"}\n```",
        );
        let extractor = TransactionExtractor::new(client, prompts());
        let candidate = extractor.extract("taxi five hundred").await.unwrap();
        assert_eq!(candidate.title.as_deref(), Some("Taxi"));
        assert_eq!(candidate.amount, Some(500.0));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_typed_failure() {
        let (backend, client) = mock();
        backend.reply_with("I'm not sure what you mean.");
        let extractor = TransactionExtractor::new(client, prompts());
        let err = extractor.extract("???").await.unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_missing_amount_is_incomplete() {
        let (backend, client) = mock();
        backend.reply_with(r#"{"title": "Coffee", "amount": null, "type": "expense"}"#);
        let extractor = TransactionExtractor::new(client, prompts());
        let err = extractor.parse("coffee").await.unwrap_err();
        assert!(matches!(err, Error::IncompleteExtraction { .. }));
    }

    #[tokio::test]
    async fn test_blank_text_skips_model() {
        let (backend, client) = mock();
        let extractor = TransactionExtractor::new(client, prompts());
        let candidate = extractor.extract("   ").await.unwrap();
        assert!(candidate.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (backend, client) = mock();
        backend.push_reply(MockReply::Fail(429));
        let extractor = TransactionExtractor::new(client, prompts());
        let err = extractor.extract("Lunch 15").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_receipt_uses_vision_model_and_image() {
        let (backend, client) = mock();
        let extractor = ReceiptExtractor::new(client, prompts());
        let receipt = extractor
            .parse(&ImagePayload::jpeg(vec![0xFF, 0xD8, 0xFF]))
            .await
            .unwrap();
        assert_eq!(receipt.kind, TransactionType::Expense);
        assert_eq!(receipt.amount, 2340.0);

        let request = &backend.requests()[0];
        assert_eq!(request.model, ModelKind::Vision);
        assert!(request.image.is_some());
        assert!(request
            .last_user_text()
            .is_some_and(|t| t.contains("Analyze this receipt")));
    }

    #[tokio::test]
    async fn test_unreadable_receipt() {
        let (backend, client) = mock();
        backend.reply_with(r#"{"title": null, "amount": null, "date": null, "type": "expense"}"#);
        let extractor = ReceiptExtractor::new(client, prompts());
        let candidate = extractor
            .extract(&ImagePayload::jpeg(vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(candidate.is_empty());
    }

    #[tokio::test]
    async fn test_empty_receipt_image_rejected() {
        let (backend, client) = mock();
        let extractor = ReceiptExtractor::new(client, prompts());
        assert!(extractor.extract(&ImagePayload::jpeg(vec![])).await.is_err());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_product_markup_is_truncated() {
        let (backend, client) = mock();
        let extractor = ProductExtractor::new(client, prompts());
        let html = format!("<html>{}</html>", "é".repeat(20_000));
        extractor.extract(&html).await.unwrap();

        let sent = backend.requests()[0].last_user_text().unwrap().to_string();
        assert_eq!(sent.chars().count(), MAX_HTML_CHARS);
    }

    #[tokio::test]
    async fn test_product_without_price_fails() {
        let (backend, client) = mock();
        backend.reply_with(r#"{"name": "Mystery Phone", "price": null, "image": null}"#);
        let extractor = ProductExtractor::new(client, prompts());
        let err = extractor.parse("<html></html>").await.unwrap_err();
        assert!(matches!(err, Error::IncompleteExtraction { ref missing } if missing == "price"));

        backend.reply_with(r#"{"name": "Mystery Phone", "price": 999}"#);
        let product = extractor.parse("<html></html>").await.unwrap();
        assert_eq!(product.image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
