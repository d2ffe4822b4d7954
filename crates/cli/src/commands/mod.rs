//! Subcommand implementations plus the wiring they share.

pub mod ask;
pub mod doctor;
pub mod ingest;
pub mod init;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use supportdesk_agent::{GenerationClient, SupportPipeline};
use supportdesk_config::AppConfig;
use supportdesk_core::embedding::Embedder;
use supportdesk_core::error::Error;
use supportdesk_core::knowledge::KnowledgeStore;
use supportdesk_knowledge::{InMemoryKnowledgeStore, Retriever, SqliteKnowledgeStore};
use tracing::warn;

/// Where the config file lives: `--config` / `SUPPORTDESK_CONFIG`, or the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    let config =
        AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Open the knowledge store selected by `store.backend`.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn KnowledgeStore>, Error> {
    let store = &config.store;
    match store.backend.as_str() {
        "memory" => {
            warn!("Using the in-memory knowledge store; contents are lost on exit");
            Ok(Arc::new(InMemoryKnowledgeStore::new()))
        }
        "sqlite" => {
            let url = store
                .resolved_url()
                .ok_or_else(|| Error::config("store.url is required for sqlite"))?;
            Ok(Arc::new(SqliteKnowledgeStore::new(&url, &store.collection).await?))
        }
        "postgres" => open_postgres(config).await,
        other => Err(Error::config(format!(
            "unknown store backend '{other}' (expected sqlite, postgres, or memory)"
        ))),
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &AppConfig) -> Result<Arc<dyn KnowledgeStore>, Error> {
    let url = config
        .store
        .url
        .as_deref()
        .ok_or_else(|| Error::config("store.url is required for postgres"))?;
    Ok(Arc::new(
        supportdesk_knowledge::PostgresKnowledgeStore::connect(url, &config.store.collection).await?,
    ))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &AppConfig) -> Result<Arc<dyn KnowledgeStore>, Error> {
    Err(Error::config(
        "store.backend = \"postgres\" requires a build with the `postgres` feature",
    ))
}

/// Build the embedder, store-backed retriever, and pipeline from config.
pub async fn build_pipeline(
    config: &AppConfig,
    store: Arc<dyn KnowledgeStore>,
) -> Result<SupportPipeline, Error> {
    let client = GenerationClient::from_config(config)?;
    let embedder: Arc<dyn Embedder> = supportdesk_providers::build_embedder(config)?;

    if config.store.index_search && !store.supports_index() {
        warn!(
            store = store.name(),
            "Index search enabled but the store has no vector index; every query will scan"
        );
    }

    let retriever = Arc::new(
        Retriever::new(embedder, store).with_index_search(config.store.index_search),
    );
    Ok(SupportPipeline::new(client, retriever, config.retrieval.top_k))
}
