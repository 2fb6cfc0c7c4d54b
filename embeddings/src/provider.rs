//! Embedding providers.
//!
//! Every provider turns an ordered batch of texts into an equally long,
//! equally ordered batch of vectors.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::retry::RetryPolicy;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model identifier used for every request.
    fn model(&self) -> &str;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        if let Some(retry_after_secs) = retry_after {
            return Err(EmbeddingError::RateLimited { retry_after_secs });
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(EmbeddingError::ApiRequest {
        status: status.as_u16(),
        body,
    })
}

/// Which Ollama route to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OllamaEndpoint {
    /// `/api/embed`: one request per batch.
    #[default]
    Batch,
    /// `/api/embeddings`: one request per text, for older servers.
    Legacy,
}

/// Ollama embedding provider.
pub struct OllamaProvider {
    /// Server base URL without trailing slash.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model.
    model: String,

    endpoint: OllamaEndpoint,

    retry: RetryPolicy,
}

impl OllamaProvider {
    /// Default local Ollama address.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    /// Default embedding model.
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";

    /// Create a provider for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(crate::DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            model: Self::DEFAULT_MODEL.to_string(),
            endpoint: OllamaEndpoint::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Select the API route.
    pub fn with_endpoint(mut self, endpoint: OllamaEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, route: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{route}", self.base_url);
        let (client, url) = (&self.client, url.as_str());
        self.retry
            .run("ollama embedding request", move || async move {
                let response = client.post(url).json(body).send().await?;
                let response = error_for_status(response).await?;
                Ok(response.json::<Value>().await?)
            })
            .await
    }

    async fn embed_batch_route(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let value = self.post("/api/embed", &body).await?;
        parse_ollama_vectors(value)
    }

    async fn embed_legacy_route(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            // Older servers read `prompt`, newer ones `input`.
            let body = serde_json::json!({
                "model": self.model,
                "input": text,
                "prompt": text,
            });
            let value = self.post("/api/embeddings", &body).await?;
            let mut parsed = parse_ollama_vectors(value)?;
            if parsed.len() != 1 {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: 1,
                    actual: parsed.len(),
                });
            }
            vectors.push(parsed.remove(0));
        }
        Ok(vectors)
    }
}

/// Extract vectors from any of the response shapes Ollama has used.
fn parse_ollama_vectors(value: Value) -> Result<Vec<Embedding>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Batch { embeddings: Vec<Embedding> },
        Single { embedding: Embedding },
        OpenAI { data: Vec<DataItem> },
    }

    #[derive(Deserialize)]
    struct DataItem {
        embedding: Embedding,
    }

    match serde_json::from_value::<Shape>(value.clone()) {
        Ok(Shape::Batch { embeddings }) => Ok(embeddings),
        Ok(Shape::Single { embedding }) => Ok(vec![embedding]),
        Ok(Shape::OpenAI { data }) if !data.is_empty() => {
            Ok(data.into_iter().map(|item| item.embedding).collect())
        }
        _ => Err(EmbeddingError::InvalidResponse(format!(
            "unexpected embeddings response: {value}"
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {} via {:?}",
            texts.len(),
            self.model,
            self.endpoint
        );

        let vectors = match self.endpoint {
            OllamaEndpoint::Batch => self.embed_batch_route(texts).await?,
            OllamaEndpoint::Legacy => self.embed_legacy_route(texts).await?,
        };

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        Ok(vectors)
    }
}

/// OpenAI-compatible embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model.
    model: String,

    /// Requested output dimension, when the model supports shortening.
    dimensions: Option<usize>,

    retry: RetryPolicy,
}

impl OpenAIProvider {
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    /// Create a new OpenAI provider, reading `OPENAI_API_KEY` if set.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(crate::DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: http_client(timeout)?,
            model: Self::DEFAULT_MODEL.to_string(),
            dimensions: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request shortened embeddings.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EmbeddingError::ProviderNotConfigured("OPENAI_API_KEY is not set".to_string())
            })?;

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let mut body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let url = format!("{}/embeddings", self.base_url);
        let (client, url, body) = (&self.client, url.as_str(), &body);
        let mut result: OpenAIEmbeddingResponse = self
            .retry
            .run("openai embedding request", move || async move {
                let response = client
                    .post(url)
                    .bearer_auth(api_key.trim())
                    .json(body)
                    .send()
                    .await?;
                let response = error_for_status(response).await?;
                Ok(response.json::<OpenAIEmbeddingResponse>().await?)
            })
            .await?;

        result.data.sort_by_key(|item| item.index);
        if result.data.len() != texts.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: texts.len(),
                actual: result.data.len(),
            });
        }

        info!("Generated {} batch embeddings", result.data.len());

        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
