//! JSON-mode chat completions.

use serde::{Deserialize, Serialize};

use super::http::{OpenAiClientConfig, OpenAiHttp};
use super::error::OpenAiApiError;
use crate::domain::errors::{DomainError, DomainResult};

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat client that always requests a JSON object response.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: OpenAiHttp,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    /// Client for `model` at a fixed sampling `temperature`.
    pub fn new(
        config: &OpenAiClientConfig,
        model: impl Into<String>,
        temperature: f32,
    ) -> DomainResult<Self> {
        Ok(Self {
            http: OpenAiHttp::new(config)?,
            model: model.into(),
            temperature,
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the raw JSON text of the first choice.
    pub async fn complete_json(&self, messages: Vec<ChatMessage>) -> DomainResult<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response: ChatCompletionResponse = self
            .http
            .post_json("chat/completions", &request)
            .await
            .map_err(|e| e.into_domain(DomainError::GenerationFailed))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                OpenAiApiError::EmptyResponse("chat completion had no content".to_string())
                    .into_domain(DomainError::GenerationFailed)
            })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
