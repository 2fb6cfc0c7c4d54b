//! # Embeddings
//!
//! Text-to-vector conversion and similarity scoring for resumebot retrieval.
//!
//! ## Features
//!
//! - **Providers**: Ollama and OpenAI-compatible embedding endpoints behind
//!   one [`EmbeddingProvider`] trait
//! - **Retry**: bounded exponential backoff for transient transport failures
//! - **Similarity**: epsilon-guarded cosine similarity
//! - **Caching**: LRU cache for repeated query embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Embedding Gateway                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  CachedProvider ──► EmbeddingProvider ──► RetryPolicy    │
//! │                          │                               │
//! │                          ▼                               │
//! │               OllamaProvider / OpenAIProvider            │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod retry;
pub mod similarity;

pub use cache::CachedProvider;
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, OllamaEndpoint, OllamaProvider, OpenAIProvider};
pub use retry::RetryPolicy;
pub use similarity::{DimensionConflict, cosine_similarity, dimension_of, is_finite};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default timeout for embedding requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
