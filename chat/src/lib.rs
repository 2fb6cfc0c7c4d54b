//! # Chat
//!
//! Grounded question answering on top of `resumebot-retrieval`: a generation
//! gateway, the persona system prompt, and the request handler that wires
//! retrieval, context assembly and generation together.
//!
//! ```text
//! ChatRequest ──► ChatHandler::answer
//!                   │  Retriever::search ──► assemble ──► [S#] context
//!                   │  system prompt + context + history + question
//!                   ▼
//!               ChatProvider::chat ──► ChatResponse { reply, sources }
//! ```

pub mod error;
pub mod handler;
pub mod message;
pub mod prompt;
pub mod provider;

pub use error::{ChatError, HandlerError, Result};
pub use handler::{ChatHandler, ChatRequest, ChatResponse};
pub use message::{ChatMessage, Role};
pub use prompt::{PersonaConfig, build_system_prompt};
pub use provider::{ChatProvider, OllamaChatProvider};

/// Default timeout for generation requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
