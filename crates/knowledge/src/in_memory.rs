//! In-memory store: useful for testing and ephemeral deployments.

use async_trait::async_trait;
use std::sync::Arc;
use supportdesk_core::error::StoreError;
use supportdesk_core::knowledge::{Chunk, KnowledgeStore};
use tokio::sync::RwLock;

/// A store that keeps chunks in a Vec. It has no vector index, so the
/// retriever always scans it.
pub struct InMemoryKnowledgeStore {
    chunks: Arc<RwLock<Vec<Chunk>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a store already holding `chunks`.
    pub fn with_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: Arc::new(RwLock::new(chunks)),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn replace(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
        let count = chunks.len();
        *self.chunks.write().await = chunks;
        Ok(count)
    }

    async fn scan(&self) -> Result<Vec<Chunk>, StoreError> {
        Ok(self.chunks.read().await.clone())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.chunks.read().await.len())
    }
}
