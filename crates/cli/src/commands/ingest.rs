//! `supportdesk ingest`: Load the knowledge base into the store.

use super::{load_config, open_store};
use std::path::{Path, PathBuf};
use supportdesk_core::{Embedder, KnowledgeStore};
use supportdesk_knowledge::{ChunkerConfig, Ingestor};

pub async fn run(
    explicit: Option<&Path>,
    dir_override: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(explicit)?;
    let dir = dir_override.unwrap_or_else(|| config.ingest.kb_dir.clone());

    let store = open_store(&config).await?;
    let embedder = supportdesk_providers::build_embedder(&config)?;
    let chunker = ChunkerConfig::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;

    println!("Ingesting {} into {} ({})", dir.display(), store.name(), config.store.collection);
    println!("  Embedding model: {}", embedder.model());

    let report = Ingestor::new(embedder, store)
        .with_chunker(chunker)
        .with_batch_size(config.embedding.batch_size)
        .ingest_dir(&dir)
        .await?;

    if report.replaced {
        println!(
            "  Ingested {} chunk(s) from {} document(s).",
            report.chunks, report.documents
        );
    } else {
        println!("  No *.txt documents found in {}; store unchanged.", dir.display());
    }

    Ok(())
}
