//! # Retrieval
//!
//! The retrieval core for resumebot: split one knowledge document into
//! heading-aware passages, embed and persist them as a vector index, and
//! answer queries with ranked, citation-tagged context.
//!
//! ## Architecture
//!
//! ```text
//! build (offline)
//!   document ──► split_markdown ──► Chunk[] ──► VectorIndex::build ──► save
//!                                                    │
//!                                            EmbeddingProvider
//! query (online)
//!   question ──► Retriever::search ──► SearchResult[] ──► assemble
//!                    │                                       │
//!          Arc<VectorIndex> (read-only)          context block + tag map
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resumebot_retrieval::{ChunkerConfig, Retriever, VectorIndex, assemble, split_markdown};
//!
//! let chunks = split_markdown(&markdown, &ChunkerConfig::default())?;
//! let index = VectorIndex::build(chunks, &provider, 16).await?;
//! index.save("data/index.json").await?;
//!
//! let retriever = Retriever::new(Arc::new(VectorIndex::load("data/index.json").await?), provider);
//! let results = retriever.search("Who is the engineer?", 5).await?;
//! let context = assemble(&results);
//! ```

pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod retriever;

pub use chunker::{Chunk, ChunkerConfig, OverlapMode, split_markdown};
pub use config::RetrievalConfig;
pub use context::{AssembledContext, Citation, SourceRef, assemble};
pub use error::{ChunkError, IndexError, RetrievalError};
pub use index::{Passage, VectorIndex};
pub use retriever::{Retriever, SearchResult};
