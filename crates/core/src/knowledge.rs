//! Knowledge store trait: the persisted chunk collection behind retrieval.
//!
//! A store holds the output of the last ingest. It offers two ways to find
//! similar chunks:
//! - Index-backed approximate search (when the backend has a vector index)
//! - A full scan, over which the retriever runs an exact dot-product ranking

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// A slice of a source document together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document identifier (the knowledge-base file name)
    pub source: String,

    /// 0-based position of this chunk within its source
    pub chunk_id: u32,

    /// The chunk text
    pub text: String,

    /// Unit-length embedding of `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(source: impl Into<String>, chunk_id: u32, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            source: source.into(),
            chunk_id,
            text: text.into(),
            embedding,
        }
    }

    /// Drop the embedding, keeping what generation needs.
    pub fn into_retrieved(self) -> RetrievedChunk {
        RetrievedChunk {
            source: self.source,
            chunk_id: self.chunk_id,
            text: self.text,
        }
    }
}

/// A chunk returned by retrieval, without its embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub source: String,
    pub chunk_id: u32,
    pub text: String,
}

impl RetrievedChunk {
    /// `source#chunk_id`
    pub fn label(&self) -> String {
        format!("{}#{}", self.source, self.chunk_id)
    }

    /// Citation string shown to customers: `text [source#chunk_id]`.
    pub fn citation(&self) -> String {
        format!("{} [{}]", self.text, self.label())
    }

    /// Block handed to the model as context: `[source#chunk_id]` then the text.
    pub fn context_block(&self) -> String {
        format!("[{}]\n{}", self.label(), self.text)
    }
}

/// Parameters for an index-backed search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSearch {
    /// Maximum number of results
    pub limit: usize,

    /// Candidate pool examined by the approximate search
    pub num_candidates: usize,
}

impl IndexSearch {
    /// Smallest candidate pool requested from an index.
    pub const MIN_CANDIDATES: usize = 50;

    /// Build a request for `top_k` results with a candidate pool of
    /// `max(50, top_k * 5)`.
    pub fn for_top_k(top_k: usize) -> Self {
        Self {
            limit: top_k,
            num_candidates: Self::MIN_CANDIDATES.max(top_k.saturating_mul(5)),
        }
    }
}

/// The core KnowledgeStore trait.
///
/// Implementations: in-memory, SQLite, PostgreSQL with pgvector.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "postgres", "in_memory").
    fn name(&self) -> &str;

    /// Whether `search` is backed by a real vector index.
    fn supports_index(&self) -> bool {
        false
    }

    /// Drop all existing chunks and insert `chunks`. Returns the number stored.
    async fn replace(&self, chunks: Vec<Chunk>) -> std::result::Result<usize, StoreError>;

    /// Every chunk, in insertion order.
    async fn scan(&self) -> std::result::Result<Vec<Chunk>, StoreError>;

    /// Approximate nearest-neighbour search against the backend's index.
    async fn search(
        &self,
        _vector: &[f32],
        _request: IndexSearch,
    ) -> std::result::Result<Vec<RetrievedChunk>, StoreError> {
        Err(StoreError::IndexUnavailable(format!(
            "store '{}' has no vector index",
            self.name()
        )))
    }

    /// Total chunk count.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RetrievedChunk {
        RetrievedChunk {
            source: "manual.txt".into(),
            chunk_id: 3,
            text: "Hold the power button for 10 seconds.".into(),
        }
    }

    #[test]
    fn citation_format() {
        assert_eq!(
            sample().citation(),
            "Hold the power button for 10 seconds. [manual.txt#3]"
        );
    }

    #[test]
    fn context_block_format() {
        assert_eq!(
            sample().context_block(),
            "[manual.txt#3]\nHold the power button for 10 seconds."
        );
    }

    #[test]
    fn into_retrieved_strips_embedding() {
        let chunk = Chunk::new("faq.txt", 0, "Charge overnight.", vec![1.0, 0.0]);
        let retrieved = chunk.into_retrieved();
        assert_eq!(retrieved.source, "faq.txt");
        assert_eq!(retrieved.chunk_id, 0);
        assert_eq!(retrieved.text, "Charge overnight.");
    }

    #[test]
    fn index_search_candidate_pool() {
        assert_eq!(IndexSearch::for_top_k(5).num_candidates, 50);
        assert_eq!(IndexSearch::for_top_k(20).num_candidates, 100);
        assert_eq!(IndexSearch::for_top_k(20).limit, 20);
    }

    #[test]
    fn chunk_serialization_skips_empty_embedding() {
        let chunk = Chunk::new("a.txt", 1, "text", vec![]);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));
    }

    struct ScanOnly;

    #[async_trait]
    impl KnowledgeStore for ScanOnly {
        fn name(&self) -> &str {
            "scan_only"
        }

        async fn replace(&self, chunks: Vec<Chunk>) -> std::result::Result<usize, StoreError> {
            Ok(chunks.len())
        }

        async fn scan(&self) -> std::result::Result<Vec<Chunk>, StoreError> {
            Ok(vec![])
        }

        async fn count(&self) -> std::result::Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn default_search_is_index_unavailable() {
        let err = ScanOnly
            .search(&[1.0], IndexSearch::for_top_k(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexUnavailable(_)));
        assert!(err.is_transient());
        assert!(!ScanOnly.supports_index());
    }
}
