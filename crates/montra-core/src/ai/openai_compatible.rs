//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API.
//! The default host is Groq, which serves both the text and the vision model
//! from the same `/v1/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiSettings;
use crate::error::{Error, Result};

use super::types::{CompletionRequest, ModelKind, ResponseFormat, Role};
use super::CompletionBackend;

/// OpenAI-compatible backend
///
/// # Example
///
/// ```rust,ignore
/// export GROQ_API_KEY="gsk_..."
/// export MONTRA_TEXT_MODEL="llama-3.3-70b-versatile"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    text_model: String,
    vision_model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a backend without an API key (local servers)
    pub fn new(base_url: &str, text_model: &str, vision_model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            text_model: text_model.to_string(),
            vision_model: vision_model.to_string(),
            api_key: None,
        }
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &AiSettings) -> Result<Self> {
        let http_client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http_client,
            base_url: settings.host.trim_end_matches('/').to_string(),
            text_model: settings.text_model.clone(),
            vision_model: settings.vision_model.clone(),
            api_key: Some(settings.api_key.clone()),
        })
    }

    /// Create a new instance with a different API key
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Build the wire request
    ///
    /// The system prompt goes first. An image is attached to the last user
    /// message as a multipart content array.
    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system_prompt {
            messages.push(ChatMessage {
                role: Role::System.as_str().to_string(),
                content: ChatContent::Text(system.clone()),
            });
        }

        let image_target = request.image.as_ref().and_then(|_| {
            request
                .messages
                .iter()
                .rposition(|m| m.role == Role::User)
        });

        for (i, message) in request.messages.iter().enumerate() {
            let content = match (&request.image, image_target) {
                (Some(image), Some(target)) if target == i => ChatContent::Parts(vec![
                    ContentPart::Text {
                        text: message.content.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ]),
                _ => ChatContent::Text(message.content.clone()),
            };
            messages.push(ChatMessage {
                role: message.role.as_str().to_string(),
                content,
            });
        }

        ChatCompletionRequest {
            model: self.model(request.model).to_string(),
            messages,
            temperature: Some(request.temperature),
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::JsonObject => Some(ResponseFormatBody {
                    kind: "json_object".to_string(),
                }),
                ResponseFormat::Text => None,
            },
            stream: false,
        }
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
    stream: bool,
}

/// Output shape hint
#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Chat message content (text or multimodal)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Content part for multimodal messages
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionBackend for OpenAICompatibleBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);
        debug!(
            task = request.task.as_str(),
            model = %body.model,
            messages = body.messages.len(),
            "Sending completion request"
        );

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(Error::EmptyCompletion)
    }

    async fn health_check(&self) -> bool {
        let mut req_builder = self
            .http_client
            .get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        match req_builder.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Text => &self.text_model,
            ModelKind::Vision => &self.vision_model,
        }
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
