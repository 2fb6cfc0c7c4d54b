//! The persisted vector index.
//!
//! An index is built offline from chunker output, written as one JSON
//! artifact, and loaded read-only by the online service. It is never updated
//! in place; rebuilding replaces the whole file.

use std::collections::HashSet;
use std::path::Path;

use resumebot_embeddings::{Embedding, EmbeddingProvider, dimension_of, is_finite};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::error::IndexError;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Source recorded for legacy records that omit one.
const LEGACY_DEFAULT_SOURCE: &str = "knowledge.md";

/// An indexed passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Unique identifier.
    pub id: String,

    /// Passage text.
    pub text: String,

    /// Nearest enclosing heading.
    #[serde(default)]
    pub section_title: String,

    /// Originating document.
    #[serde(default = "legacy_default_source")]
    pub source: String,

    /// Embedding of `text`.
    pub embedding: Embedding,
}

fn legacy_default_source() -> String {
    LEGACY_DEFAULT_SOURCE.to_string()
}

/// An ordered, read-only collection of passages sharing one embedding dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    passages: Vec<Passage>,
    dimension: usize,
    model: Option<String>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: u32,
    dimension: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    passages: &'a [Passage],
}

#[derive(Deserialize)]
struct IndexFile {
    version: u32,
    dimension: usize,
    #[serde(default)]
    model: Option<String>,
    passages: Vec<Passage>,
}

/// Either the versioned document or the bare record array older tooling wrote.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIndex {
    Versioned(IndexFile),
    Legacy(Vec<Passage>),
}

impl VectorIndex {
    /// Create an index from passages, validating every invariant.
    pub fn from_passages(passages: Vec<Passage>, model: Option<String>) -> Result<Self, IndexError> {
        let dimension = validate(&passages)?;
        Ok(Self {
            passages,
            dimension,
            model,
        })
    }

    /// Embed `chunks` in batches of `batch_size` and build an index.
    ///
    /// Nothing is persisted here; a failed build leaves no artifact behind.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        let batch_size = batch_size.max(1);
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = provider.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(IndexError::DimensionMismatch {
                    submitted: texts.len(),
                    received: vectors.len(),
                });
            }
            debug!("Embedded batch {} ({} passages)", batch_no + 1, texts.len());
            embeddings.extend(vectors);
        }

        if let Err(conflict) = dimension_of(&embeddings) {
            return Err(IndexError::InconsistentDimension {
                id: chunks[conflict.position].id.clone(),
                expected: conflict.expected,
                actual: conflict.actual,
            });
        }

        let passages: Vec<Passage> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Passage {
                id: chunk.id,
                text: chunk.text,
                section_title: chunk.section_title,
                source: chunk.source,
                embedding,
            })
            .collect();

        let index = Self::from_passages(passages, Some(provider.model().to_string()))?;
        info!(
            "Built index with {} passages (dimension {}) using {}/{}",
            index.len(),
            index.dimension(),
            provider.name(),
            provider.model()
        );
        Ok(index)
    }

    /// Load an index artifact from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let index = Self::from_json(&content)?;
        info!(
            "Loaded {} passages (dimension {}) from {}",
            index.len(),
            index.dimension(),
            path.display()
        );
        Ok(index)
    }

    /// Parse an index from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        match serde_json::from_str::<StoredIndex>(json)? {
            StoredIndex::Versioned(file) => {
                if file.version > FORMAT_VERSION {
                    return Err(IndexError::UnsupportedVersion {
                        found: file.version,
                        supported: FORMAT_VERSION,
                    });
                }
                let index = Self::from_passages(file.passages, file.model)?;
                if !index.is_empty() && index.dimension != file.dimension {
                    return Err(IndexError::Corrupt(format!(
                        "header declares dimension {}, passages have {}",
                        file.dimension, index.dimension
                    )));
                }
                Ok(index)
            }
            StoredIndex::Legacy(passages) => {
                debug!("Reading version-less index with {} records", passages.len());
                Self::from_passages(passages, None)
            }
        }
    }

    /// Serialize the index to its JSON representation.
    pub fn to_json(&self) -> Result<String, IndexError> {
        let file = IndexFileRef {
            version: FORMAT_VERSION,
            dimension: self.dimension,
            model: self.model.as_deref(),
            passages: &self.passages,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the index atomically, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let content = self.to_json()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        if let Err(err) = fs::rename(&temp_path, path).await {
            // Leave nothing behind when the existing index cannot be replaced.
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                debug!("Failed to remove {}: {cleanup}", temp_path.display());
            }
            return Err(err.into());
        }

        info!("Wrote {} passages to {}", self.len(), path.display());
        Ok(())
    }

    /// Passages in index order.
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Embedding dimension shared by every passage (0 when empty).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding model recorded at build time, if known.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Get a passage by id.
    pub fn get(&self, id: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.id == id)
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Whether the index has no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Check id uniqueness and embedding shape; returns the shared dimension.
fn validate(passages: &[Passage]) -> Result<usize, IndexError> {
    let mut seen = HashSet::with_capacity(passages.len());
    let mut dimension = None;

    for passage in passages {
        if !seen.insert(passage.id.as_str()) {
            return Err(IndexError::Corrupt(format!(
                "duplicate passage id {}",
                passage.id
            )));
        }
        if passage.embedding.is_empty() {
            return Err(IndexError::Corrupt(format!(
                "passage {} has an empty embedding",
                passage.id
            )));
        }
        if !is_finite(&passage.embedding) {
            return Err(IndexError::Corrupt(format!(
                "passage {} has non-finite embedding values",
                passage.id
            )));
        }
        match dimension {
            None => dimension = Some(passage.embedding.len()),
            Some(expected) if expected != passage.embedding.len() => {
                return Err(IndexError::Corrupt(format!(
                    "passage {} has embedding dimension {}, expected {expected}",
                    passage.id,
                    passage.embedding.len()
                )));
            }
            Some(_) => {}
        }
    }

    Ok(dimension.unwrap_or(0))
}
