//! Embedders that need no local model weights.
//!
//! - [`RemoteEmbedder`] calls a provider's `/embeddings` endpoint.
//! - [`HashEmbedder`] is a deterministic feature-hashing bag of words, used
//!   for offline runs and tests.
//!
//! Both return unit-length vectors.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use supportdesk_core::embedding::{l2_norm, normalize, Embedder};
use supportdesk_core::error::EmbeddingError;
use supportdesk_core::provider::{EmbeddingRequest, Provider};
use tracing::debug;

/// Embeds text through an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: Option<usize>,
}

impl RemoteEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension: None,
        }
    }

    /// Enforce an expected output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.embeddings.len(),
            });
        }

        let mut vectors = response.embeddings;
        for v in vectors.iter_mut() {
            match self.dimension {
                Some(expected) if v.len() != expected => {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: v.len(),
                    });
                }
                _ => {}
            }
            normalize(v);
        }

        debug!(model = %self.model, count = vectors.len(), "Embedded texts remotely");
        Ok(vectors)
    }
}

/// Stands in for the tokens of text that has none. Contains a non-alphanumeric
/// char, so no real token equals it.
const EMPTY_TEXT_TOKEN: &str = "\u{0}empty";

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256; the first eight
/// bytes pick a bucket and the ninth byte picks a sign. Texts sharing words
/// land close together, which is enough for keyword-level retrieval without
/// model weights. Text with no tokens (or whose tokens cancel out) maps to
/// the bucket of a fixed sentinel, so every output is unit length.
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("feature-hash-{dimension}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            self.add_token(&mut v, &token);
        }
        if l2_norm(&v) == 0.0 {
            self.add_token(&mut v, EMPTY_TEXT_TOKEN);
        }
        normalize(&mut v);
        v
    }

    fn add_token(&self, v: &mut [f32], token: &str) {
        let digest = Sha256::digest(token.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
