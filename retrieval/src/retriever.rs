//! Exact nearest-neighbour search over a loaded index.

use std::cmp::Reverse;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use resumebot_embeddings::{EmbeddingProvider, cosine_similarity, is_finite};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RetrievalError;
use crate::index::VectorIndex;

/// One ranked passage returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Passage id.
    pub id: String,

    /// Cosine similarity between query and passage.
    pub score: f32,

    /// Passage text.
    pub text: String,

    /// Passage heading.
    pub section_title: String,

    /// Originating document.
    pub source: String,

    /// 1-based position in the ranking.
    pub rank: usize,
}

impl VectorIndex {
    /// Rank every passage against `query` and keep the best `top_k`.
    ///
    /// Ties keep index order. An empty index yields no results.
    pub fn rank(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(RetrievalError::QueryDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        if !is_finite(query) {
            return Err(RetrievalError::InvalidQueryEmbedding);
        }

        let mut scored = self
            .passages()
            .iter()
            .map(|passage| -> Result<_, RetrievalError> {
                Ok((passage, cosine_similarity(query, &passage.embedding)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Stable sort: equal scores stay in index order.
        scored.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (passage, score))| SearchResult {
                id: passage.id.clone(),
                score,
                text: passage.text.clone(),
                section_title: passage.section_title.clone(),
                source: passage.source.clone(),
                rank: i + 1,
            })
            .collect())
    }
}

/// Answers queries against one shared, read-only index.
///
/// Cloning is cheap; clones share the index and provider.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Create a retriever over `index`, embedding queries with `provider`.
    pub fn new(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    /// The index being searched.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embed `query` and return at most `top_k` passages, best first.
    ///
    /// The provider is not called when the index is empty. Provider failures
    /// are returned as errors, never as an empty result.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query).await?;
        let results = self.index.rank(&query_vector, top_k)?;

        debug!(
            "Retrieved {} of {} passages (best score {:?})",
            results.len(),
            self.index.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }
}
