//! Error types for generation and request handling.

use resumebot_retrieval::RetrievalError;
use thiserror::Error;

/// Result type alias for generation calls.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors from the generation gateway.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Server answered with a non-success status.
    #[error("chat request failed with status {status}: {body}")]
    ApiRequest { status: u16, body: String },

    /// Server answered with a body that carries no reply.
    #[error("unexpected chat response: {0}")]
    InvalidResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a chat request could not be answered.
///
/// The display strings are what HTTP clients see as the error detail.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The user message was blank.
    #[error("Empty message")]
    EmptyMessage,

    /// Query embedding or ranking failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The generator failed.
    #[error("LLM call failed: {0}")]
    Generation(#[from] ChatError),
}
