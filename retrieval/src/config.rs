//! Configuration for index building and search.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;

/// Configuration shared by the offline build and the online search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Markdown knowledge document to index.
    pub knowledge_path: PathBuf,

    /// Location of the persisted index artifact.
    pub index_path: PathBuf,

    /// Chunking parameters.
    pub chunker: ChunkerConfig,

    /// Passages per embedding request during build.
    pub batch_size: usize,

    /// Passages returned per query.
    pub top_k: usize,
}

impl RetrievalConfig {
    /// Default passages per embedding request.
    pub const DEFAULT_BATCH_SIZE: usize = 16;

    /// Default passages per query.
    pub const DEFAULT_TOP_K: usize = 5;

    /// Create a configuration rooted at a data directory, using
    /// `knowledge.md` and `index.json` inside it.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            knowledge_path: data_dir.join("knowledge.md"),
            index_path: data_dir.join("index.json"),
            chunker: ChunkerConfig::default(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    /// Set the knowledge document path.
    pub fn with_knowledge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.knowledge_path = path.into();
        self
    }

    /// Set the index artifact path.
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    /// Set the chunker configuration.
    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the embedding batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of passages returned per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::OverlapMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.knowledge_path, PathBuf::from("data/knowledge.md"));
        assert_eq!(config.index_path, PathBuf::from("data/index.json"));
        assert_eq!(config.chunker.target_size, 800);
        assert_eq!(config.chunker.overlap, 100);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: RetrievalConfig = serde_json::from_str(
            r#"{"top_k": 3, "chunker": {"target_size": 400, "overlap_mode": "back_step"}}"#,
        )
        .unwrap();

        assert_eq!(config.top_k, 3);
        assert_eq!(config.batch_size, RetrievalConfig::DEFAULT_BATCH_SIZE);
        assert_eq!(config.chunker.target_size, 400);
        assert_eq!(config.chunker.overlap, 100);
        assert_eq!(config.chunker.overlap_mode, OverlapMode::BackStep);
    }
}
