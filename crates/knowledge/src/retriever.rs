//! Retriever: top-K chunk lookup for a query.
//!
//! Two strategies:
//! - Index-backed approximate search through [`KnowledgeStore::search`]
//! - Brute-force fallback: scan everything and rank by dot product
//!
//! The fallback runs when index search is disabled or when the index
//! reports a transient failure. Any other store error reaches the caller.

use crate::vector::rank_top_k;
use std::sync::Arc;
use supportdesk_core::embedding::Embedder;
use supportdesk_core::error::Error;
use supportdesk_core::knowledge::{IndexSearch, KnowledgeStore, RetrievedChunk};
use tracing::{debug, warn};

/// Finds the chunks most similar to a query.
///
/// Holds only shared read-only handles, so one retriever serves concurrent
/// requests.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    use_index: bool,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            embedder,
            store,
            use_index: false,
        }
    }

    /// Try the store's vector index before scanning.
    pub fn with_index_search(mut self, enabled: bool) -> Self {
        self.use_index = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Return at most `top_k` chunks, most similar first.
    ///
    /// An empty store or `top_k == 0` yields an empty list, not an error.
    /// Stored embeddings must have the query embedding's dimension.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, Error> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query).await?;

        if self.use_index {
            match self
                .store
                .search(&query_vector, IndexSearch::for_top_k(top_k))
                .await
            {
                Ok(mut hits) => {
                    hits.truncate(top_k);
                    debug!(store = self.store.name(), hits = hits.len(), "Index search");
                    return Ok(hits);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        store = self.store.name(),
                        error = %e,
                        "Index search unavailable, falling back to brute-force scan"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let chunks = self.store.scan().await?;
        let scanned = chunks.len();
        let hits = rank_top_k(chunks, &query_vector, top_k)?;
        debug!(
            store = self.store.name(),
            scanned,
            hits = hits.len(),
            "Brute-force search"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryKnowledgeStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use supportdesk_core::error::{EmbeddingError, StoreError};
    use supportdesk_core::knowledge::Chunk;

    /// Maps known phrases to fixed unit vectors.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model(&self) -> &str {
            "axis"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    q if q.contains("reset") => vec![1.0, 0.0, 0.0],
                    q if q.contains("battery") => vec![0.0, 1.0, 0.0],
                    _ => vec![0.0, 0.0, 1.0],
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn model(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::ModelLoad("weights missing".into()))
        }
    }

    /// Store whose index either answers, fails transiently, or fails hard.
    enum IndexBehaviour {
        Answers(Vec<RetrievedChunk>),
        Unavailable,
        QueryError,
    }

    struct IndexedStore {
        inner: InMemoryKnowledgeStore,
        index: IndexBehaviour,
        last_request: Mutex<Option<IndexSearch>>,
        scans: Mutex<usize>,
    }

    impl IndexedStore {
        fn new(chunks: Vec<Chunk>, index: IndexBehaviour) -> Self {
            Self {
                inner: InMemoryKnowledgeStore::with_chunks(chunks),
                index,
                last_request: Mutex::new(None),
                scans: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl KnowledgeStore for IndexedStore {
        fn name(&self) -> &str {
            "indexed"
        }

        fn supports_index(&self) -> bool {
            true
        }

        async fn replace(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
            self.inner.replace(chunks).await
        }

        async fn scan(&self) -> Result<Vec<Chunk>, StoreError> {
            *self.scans.lock().unwrap() += 1;
            self.inner.scan().await
        }

        async fn search(
            &self,
            _vector: &[f32],
            request: IndexSearch,
        ) -> Result<Vec<RetrievedChunk>, StoreError> {
            *self.last_request.lock().unwrap() = Some(request);
            match &self.index {
                IndexBehaviour::Answers(hits) => Ok(hits.clone()),
                IndexBehaviour::Unavailable => {
                    Err(StoreError::Unavailable("connection refused".into()))
                }
                IndexBehaviour::QueryError => Err(StoreError::Query("syntax error".into())),
            }
        }

        async fn count(&self) -> Result<usize, StoreError> {
            self.inner.count().await
        }
    }

    fn kb() -> Vec<Chunk> {
        vec![
            Chunk::new("manual.txt", 0, "To factory reset, hold power 10s.", vec![1.0, 0.0, 0.0]),
            Chunk::new("manual.txt", 1, "Charge the battery for 2 hours.", vec![0.0, 1.0, 0.0]),
            Chunk::new("faq.txt", 0, "Reset also clears pairings.", vec![0.8, 0.6, 0.0]),
        ]
    }

    fn retrieved(source: &str, chunk_id: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: source.into(),
            chunk_id,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn brute_force_ranks_by_similarity() {
        let store = Arc::new(InMemoryKnowledgeStore::with_chunks(kb()));
        let retriever = Retriever::new(Arc::new(AxisEmbedder), store);

        let hits = retriever.retrieve("how to reset", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].citation(), "To factory reset, hold power 10s. [manual.txt#0]");
        assert_eq!(hits[1].source, "faq.txt");
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let retriever = Retriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(InMemoryKnowledgeStore::new()),
        );
        assert!(retriever.retrieve("reset", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_returns_empty_without_embedding() {
        let retriever = Retriever::new(
            Arc::new(BrokenEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(kb())),
        );
        assert!(retriever.retrieve("reset", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_is_fatal() {
        let retriever = Retriever::new(
            Arc::new(BrokenEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(kb())),
        );
        let err = retriever.retrieve("reset", 3).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn index_results_used_in_index_order() {
        let hits = vec![
            retrieved("faq.txt", 0, "Reset also clears pairings."),
            retrieved("manual.txt", 0, "To factory reset, hold power 10s."),
        ];
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::Answers(hits.clone())));
        let retriever =
            Retriever::new(Arc::new(AxisEmbedder), store.clone()).with_index_search(true);

        let result = retriever.retrieve("reset", 5).await.unwrap();
        assert_eq!(result, hits);
        assert_eq!(*store.scans.lock().unwrap(), 0);

        let request = store.last_request.lock().unwrap().unwrap();
        assert_eq!(request.limit, 5);
        assert_eq!(request.num_candidates, 50);
    }

    #[tokio::test]
    async fn index_results_truncated_to_top_k() {
        let hits = vec![
            retrieved("a.txt", 0, "a"),
            retrieved("b.txt", 0, "b"),
            retrieved("c.txt", 0, "c"),
        ];
        let store = Arc::new(IndexedStore::new(vec![], IndexBehaviour::Answers(hits)));
        let retriever = Retriever::new(Arc::new(AxisEmbedder), store).with_index_search(true);

        let result = retriever.retrieve("reset", 2).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].source, "b.txt");
    }

    #[tokio::test]
    async fn transient_index_failure_falls_back_to_scan() {
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::Unavailable));
        let retriever =
            Retriever::new(Arc::new(AxisEmbedder), store.clone()).with_index_search(true);

        let hits = retriever.retrieve("battery life", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Charge the battery for 2 hours.");
        assert_eq!(*store.scans.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn fallback_matches_pure_scan() {
        let indexed = Arc::new(IndexedStore::new(kb(), IndexBehaviour::Unavailable));
        let via_fallback = Retriever::new(Arc::new(AxisEmbedder), indexed)
            .with_index_search(true)
            .retrieve("reset", 3)
            .await
            .unwrap();

        let plain = Retriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(kb())),
        )
        .retrieve("reset", 3)
        .await
        .unwrap();

        assert_eq!(via_fallback, plain);
    }

    #[tokio::test]
    async fn non_transient_index_failure_propagates() {
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::QueryError));
        let retriever =
            Retriever::new(Arc::new(AxisEmbedder), store.clone()).with_index_search(true);

        let err = retriever.retrieve("reset", 3).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Query(_))));
        assert_eq!(*store.scans.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn index_disabled_never_calls_search() {
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::QueryError));
        let retriever = Retriever::new(Arc::new(AxisEmbedder), store.clone());

        let hits = retriever.retrieve("reset", 1).await.unwrap();
        assert_eq!(hits[0].source, "manual.txt");
        assert!(store.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn equal_scores_keep_storage_order() {
        let chunks = vec![
            Chunk::new("b.txt", 0, "second-stored first", vec![0.0, 0.0, 1.0]),
            Chunk::new("a.txt", 0, "stored later", vec![0.0, 0.0, 1.0]),
        ];
        let retriever = Retriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(chunks)),
        );
        let hits = retriever.retrieve("anything else", 2).await.unwrap();
        assert_eq!(hits[0].source, "b.txt");
        assert_eq!(hits[1].source, "a.txt");
    }

    /// Embeds every text into a 2-dim space.
    struct PlaneEmbedder;

    #[async_trait]
    impl Embedder for PlaneEmbedder {
        fn model(&self) -> &str {
            "plane"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn query_dimension_must_match_store() {
        let chunks = vec![
            Chunk::new("a.txt", 0, "a", vec![0.0, 0.0, 1.0]),
            Chunk::new("b.txt", 0, "b", vec![0.0, 1.0, 0.0]),
        ];
        let retriever = Retriever::new(
            Arc::new(PlaneEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(chunks)),
        );

        let err = retriever.retrieve("q", 1).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Embedding(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn fallback_rejects_dimension_mismatch() {
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::Unavailable));
        let retriever = Retriever::new(Arc::new(PlaneEmbedder), store).with_index_search(true);

        let err = retriever.retrieve("q", 2).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Embedding(EmbeddingError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_scan_retrieval_is_identical() {
        let retriever = Retriever::new(
            Arc::new(AxisEmbedder),
            Arc::new(InMemoryKnowledgeStore::with_chunks(kb())),
        );

        let first = retriever.retrieve("reset", 3).await.unwrap();
        let second = retriever.retrieve("reset", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn repeated_index_retrieval_is_identical() {
        let hits = vec![
            retrieved("faq.txt", 0, "Reset also clears pairings."),
            retrieved("manual.txt", 0, "To factory reset, hold power 10s."),
        ];
        let store = Arc::new(IndexedStore::new(kb(), IndexBehaviour::Answers(hits)));
        let retriever =
            Retriever::new(Arc::new(AxisEmbedder), store.clone()).with_index_search(true);

        let first = retriever.retrieve("reset", 2).await.unwrap();
        let second = retriever.retrieve("reset", 2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(*store.scans.lock().unwrap(), 0);
    }
}
