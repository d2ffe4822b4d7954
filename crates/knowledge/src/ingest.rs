//! Ingestion: load a directory of `*.txt` files into a knowledge store.
//!
//! Every run fully replaces the store contents; the last ingest wins.

use crate::chunker::ChunkerConfig;
use std::path::Path;
use std::sync::Arc;
use supportdesk_core::embedding::Embedder;
use supportdesk_core::error::Error;
use supportdesk_core::knowledge::{Chunk, KnowledgeStore};
use tracing::{debug, info, warn};

/// A source document before chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name, used as the chunk source id.
    pub source: String,
    pub text: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// False when there was nothing to ingest and the store was left alone.
    pub replaced: bool,
}

/// Chunks, embeds and stores documents.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    chunker: ChunkerConfig,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            embedder,
            store,
            chunker: ChunkerConfig::default(),
            batch_size: 32,
        }
    }

    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    /// Texts per embedding call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Ingest every `*.txt` file in `dir`.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport, Error> {
        let documents = load_documents(dir).await?;
        self.ingest(documents).await
    }

    /// Chunk, embed and store `documents`, replacing all prior content.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport, Error> {
        if documents.is_empty() {
            warn!("No documents to ingest; knowledge store left unchanged");
            return Ok(IngestReport::default());
        }

        let mut pending: Vec<(String, u32, String)> = Vec::new();
        for doc in &documents {
            let windows = self.chunker.chunk_text(&doc.text);
            debug!(source = %doc.source, chunks = windows.len(), "Chunked document");
            for (i, text) in windows.into_iter().enumerate() {
                pending.push((doc.source.clone(), i as u32, text));
            }
        }

        let mut chunks = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, _, t)| t.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(supportdesk_core::error::EmbeddingError::CountMismatch {
                    expected: texts.len(),
                    actual: vectors.len(),
                }
                .into());
            }
            for ((source, chunk_id, text), embedding) in batch.iter().cloned().zip(vectors) {
                chunks.push(Chunk::new(source, chunk_id, text, embedding));
            }
        }

        let stored = self.store.replace(chunks).await?;
        info!(
            documents = documents.len(),
            chunks = stored,
            store = self.store.name(),
            model = self.embedder.model(),
            "Ingestion complete"
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: stored,
            replaced: true,
        })
    }
}

/// Read every `*.txt` file directly inside `dir`, sorted by file name.
///
/// A missing directory yields no documents. Invalid UTF-8 is replaced
/// rather than rejected.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>, Error> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Knowledge-base directory not found");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(Error::Internal(format!(
                "Failed to read {}: {e}",
                dir.display()
            )));
        }
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Internal(format!("Failed to list {}: {e}", dir.display())))?
    {
        let path = entry.path();
        let is_txt = path.extension().is_some_and(|ext| ext == "txt");
        if is_txt && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read {}: {e}", path.display())))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(Document {
            source,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    debug!(dir = %dir.display(), count = documents.len(), "Loaded documents");
    Ok(documents)
}
