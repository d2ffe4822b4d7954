//! Embedder trait: turns text into unit-length vectors.
//!
//! All vectors that are compared by dot product must be unit-norm, so that
//! the dot product equals cosine similarity. Every `Embedder` implementation
//! is responsible for returning normalized vectors.

use async_trait::async_trait;
use crate::error::EmbeddingError;

/// Tolerance used when checking that a vector is unit length.
pub const UNIT_NORM_EPSILON: f32 = 1e-4;

/// The core Embedder trait.
///
/// Implementations: local sentence-transformers (candle), remote
/// OpenAI-compatible `/embeddings`, and a deterministic hashing embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g., "sentence-transformers/all-MiniLM-L6-v2").
    fn model(&self) -> &str;

    /// Output dimensionality, when known before the first call.
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Embed a batch of texts. Returns exactly one unit-norm vector per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            actual => Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

/// Euclidean length of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt() as f32
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Whether `v` has length 1 within [`UNIT_NORM_EPSILON`].
pub fn is_unit_norm(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_NORM_EPSILON
}
