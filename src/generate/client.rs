//! The chat-completion boundary.
//!
//! [`ChatClient`] is the seam the fallback chain calls through; the real
//! implementation is [`OpenRouterClient`]. A 429 response is the only status
//! with special meaning ([`CompletionError::RateLimited`]).

use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "You are an expert technical journalist with deep domain knowledge. \
Write with vivid examples, concrete numbers and expert analysis. \
Output exactly what is requested, with no reasoning tags and no preamble.";

/// Longest error body kept in a [`CompletionError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// User prompt.
    pub prompt: String,
    /// Token budget for the response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Why a single completion call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The backend answered 429.
    #[error("rate limited")]
    RateLimited,
    /// The backend answered with another non-success status.
    #[error("HTTP {code}: {body}")]
    Status {
        /// Status code.
        code: u16,
        /// Start of the response body.
        body: String,
    },
    /// The request did not complete or the response was not understood.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response was empty or too short to be useful.
    #[error("empty or too short response")]
    Empty,
}

/// Something that can complete a chat prompt.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one request and returns the raw response text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError>;
}

#[async_trait::async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}

#[async_trait::async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Box<T> {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}

/// A [`ChatClient`] for OpenRouter-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    /// Creates a client for `{base_url}/chat/completions`.
    ///
    /// `referer` and `title` are sent as the `HTTP-Referer` and `X-Title`
    /// attribution headers.
    #[must_use]
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

impl<'a> From<&'a ChatRequest> for RequestBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ResponseBody {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenRouterClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        debug!(model = %request.model, "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&RequestBody::from(request))
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                code: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let body: ResponseBody = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(body.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let request = ChatRequest {
            model: "vendor/model:free".to_string(),
            prompt: "Write".to_string(),
            max_tokens: 800,
            temperature: 0.5,
        };

        let json = serde_json::to_value(RequestBody::from(&request)).unwrap();

        assert_eq!(json["model"], "vendor/model:free");
        assert_eq!(json["max_tokens"], 800);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Write");
    }

    #[test]
    fn response_text_is_first_choice() {
        let body: ResponseBody = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hello"}},{"message":{"content":"other"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_text(), "hello");
    }

    #[test]
    fn missing_choices_yield_empty_text() {
        let body: ResponseBody = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(body.into_text(), "");

        let body: ResponseBody =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(body.into_text(), "");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = OpenRouterClient::new("https://example.test/api/v1/", "k", "r", "t");
        assert_eq!(client.endpoint, "https://example.test/api/v1/chat/completions");
    }
}
