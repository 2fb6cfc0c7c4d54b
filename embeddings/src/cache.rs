//! Embedding cache for repeated queries.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// A provider wrapper that remembers the most recently embedded texts.
///
/// Misses within one batch are forwarded to the inner provider as a single
/// batch, so output order and batching behaviour are preserved.
pub struct CachedProvider<P> {
    provider: P,
    cache: Mutex<LruCache<String, Embedding>>,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Wrap `provider` with a cache holding up to `capacity` embeddings.
    pub fn new(provider: P, capacity: NonZeroUsize) -> Self {
        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    /// Get the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        self.provider.model()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut slots: Vec<Option<Embedding>> = {
            let mut cache = self.cache.lock().await;
            texts.iter().map(|text| cache.get(text).cloned()).collect()
        };

        let misses: Vec<String> = texts
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(text, _)| text.clone())
            .collect();

        if misses.is_empty() {
            debug!("Embedding cache hit for {} texts", texts.len());
        } else {
            // The lock is not held across the provider call.
            let fresh = self.provider.embed_batch(&misses).await?;
            if fresh.len() != misses.len() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: misses.len(),
                    actual: fresh.len(),
                });
            }

            let mut cache = self.cache.lock().await;
            let mut fresh = misses.into_iter().zip(fresh);
            for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
                if let Some((text, embedding)) = fresh.next() {
                    cache.put(text, embedding.clone());
                    *slot = Some(embedding);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    EmbeddingError::InvalidResponse("missing embedding for cached batch".to_string())
                })
            })
            .collect()
    }
}
