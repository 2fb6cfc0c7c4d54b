//! Generation providers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::message::ChatMessage;

/// Turns a conversation into the next assistant reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model identifier used for every request.
    fn model(&self) -> &str;

    /// Generate a reply to `messages`.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Ollama `/api/chat` client, non-streaming.
pub struct OllamaChatProvider {
    base_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

impl OllamaChatProvider {
    /// Default generation model.
    pub const DEFAULT_MODEL: &'static str = "phi3:mini";

    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f32 = 0.6;

    /// Create a provider for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(crate::DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: Self::DEFAULT_TEMPERATURE,
        })
    }

    /// Set the generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatProvider for OllamaChatProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            "Sending {} messages to {} at {}",
            messages.len(),
            self.model,
            self.base_url
        );

        let body = ChatRequestBody {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiRequest {
                status: status.as_u16(),
                body,
            });
        }

        parse_reply(response.json::<Value>().await?)
    }
}

/// Pull the reply out of either `message.content` or a top-level `content`.
fn parse_reply(value: Value) -> Result<String> {
    let reply = value
        .pointer("/message/content")
        .or_else(|| value.get("content"))
        .and_then(Value::as_str);
    match reply {
        Some(reply) => Ok(reply.to_string()),
        None => Err(ChatError::InvalidResponse(value.to_string())),
    }
}
