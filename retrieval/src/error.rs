//! Error types for chunking, index persistence, and search.

use std::path::PathBuf;

use resumebot_embeddings::EmbeddingError;
use thiserror::Error;

/// Invalid chunker settings.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkError {
    /// The window size or overlap cannot make progress.
    #[error("invalid chunker configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while building, saving, or loading the vector index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// No index artifact at the configured location.
    #[error("index not found at {}; run `resumebot build` first", path.display())]
    NotFound { path: PathBuf },

    /// The artifact parsed but violates an index invariant.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    /// The provider returned a different number of vectors than passages submitted.
    #[error("embedding count mismatch: submitted {submitted} passages, received {received} vectors")]
    DimensionMismatch { submitted: usize, received: usize },

    /// A freshly embedded passage has a different length than the others.
    #[error("passage {id} has embedding dimension {actual}, expected {expected}")]
    InconsistentDimension {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// The artifact was written by a newer format.
    #[error("unsupported index format version {found}, this build reads up to {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Embedding provider failure during build.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while answering a single query.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The embedding provider failed for the query text.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The query vector does not match the index dimension.
    #[error("query embedding has dimension {actual}, index expects {expected}")]
    QueryDimension { expected: usize, actual: usize },

    /// The query vector contains NaN or infinite components.
    #[error("query embedding contains non-finite values")]
    InvalidQueryEmbedding,
}
