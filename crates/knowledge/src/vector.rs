//! Vector similarity and exact top-K ranking.
//!
//! Pure-Rust implementations of:
//! - Dot product (equal to cosine similarity for unit vectors)
//! - Brute-force top-K selection over a full scan

use supportdesk_core::error::EmbeddingError;
use supportdesk_core::knowledge::{Chunk, RetrievedChunk};

/// Dot product of two vectors of equal length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum::<f64>() as f32
}

/// Rank chunks by dot product with `query` and keep the `k` best.
///
/// Ordering is descending by score; equal scores keep their scan order, so
/// the result is fully deterministic for a given store content. Every
/// stored embedding must have the query's dimension.
pub fn rank_top_k(
    chunks: Vec<Chunk>,
    query: &[f32],
    k: usize,
) -> Result<Vec<RetrievedChunk>, EmbeddingError> {
    if k == 0 {
        return Ok(Vec::new());
    }

    if let Some(chunk) = chunks.iter().find(|c| c.embedding.len() != query.len()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: chunk.embedding.len(),
            actual: query.len(),
        });
    }

    let mut scored: Vec<(f32, Chunk)> = chunks
        .into_iter()
        .map(|chunk| (dot(&chunk.embedding, query), chunk))
        .collect();

    // sort_by is stable: ties stay in storage order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(k);
    Ok(scored.into_iter().map(|(_, c)| c.into_retrieved()).collect())
}
