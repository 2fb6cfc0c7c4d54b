//! Similarity computation for embeddings.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Added to each vector norm so a zero vector scores 0.0 instead of NaN.
pub const NORM_EPSILON: f64 = 1e-12;

/// Compute the cosine similarity between two embeddings.
///
/// `(a·b) / ((‖a‖ + ε)(‖b‖ + ε))`, accumulated in `f64` and clamped to
/// `[-1.0, 1.0]` so rounding never pushes a score out of range:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal (or a degenerate zero vector)
/// - -1.0 means opposite direction
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a.sqrt() + NORM_EPSILON) * (norm_b.sqrt() + NORM_EPSILON);
    Ok(((dot / denominator) as f32).clamp(-1.0, 1.0))
}

/// Two embeddings in one set disagree on length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionConflict {
    /// Position of the first embedding whose length differs.
    pub position: usize,
    /// Length of the first embedding in the set.
    pub expected: usize,
    /// Length found at `position`.
    pub actual: usize,
}

/// Common dimension of a set of embeddings, `None` for an empty set.
pub fn dimension_of(
    embeddings: &[Embedding],
) -> std::result::Result<Option<usize>, DimensionConflict> {
    let Some(first) = embeddings.first() else {
        return Ok(None);
    };
    let expected = first.len();
    match embeddings.iter().position(|e| e.len() != expected) {
        Some(position) => Err(DimensionConflict {
            position,
            expected,
            actual: embeddings[position].len(),
        }),
        None => Ok(Some(expected)),
    }
}

/// Whether every component is a finite number.
pub fn is_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| x.is_finite())
}
