//! SQLite knowledge store.
//!
//! Uses a single table named after the collection:
//! - `iid`: autoincrement key, preserves insertion order for scans
//! - `source`, `chunk_id`, `text`: the chunk record
//! - `embedding`: little-endian f32 blob
//!
//! SQLite has no vector index here; the retriever always scans.

use crate::sql::{classify, decode_blob, encode_blob, validate_table_name};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use supportdesk_core::error::StoreError;
use supportdesk_core::knowledge::{Chunk, KnowledgeStore};
use tracing::{debug, info};

/// A SQLite-backed knowledge store.
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteKnowledgeStore {
    /// Open (or create) a store from a SQLite URL such as
    /// `sqlite:///var/lib/supportdesk/knowledge.db`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests).
    pub async fn new(url: &str, collection: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(url)?;
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool, collection).await?;
        info!(url, collection, "SQLite knowledge store initialized");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool, collection: &str) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            table: validate_table_name(collection)?,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                source     TEXT NOT NULL,
                chunk_id   INTEGER NOT NULL,
                text       TEXT NOT NULL,
                embedding  BLOB NOT NULL
            )
            "#,
            table = self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{} table: {e}", self.table)))?;

        debug!(table = %self.table, "SQLite migrations complete");
        Ok(())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk, StoreError> {
        let source: String = row
            .try_get("source")
            .map_err(|e| StoreError::Query(format!("source column: {e}")))?;
        let chunk_id: i64 = row
            .try_get("chunk_id")
            .map_err(|e| StoreError::Query(format!("chunk_id column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::Query(format!("text column: {e}")))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| StoreError::Query(format!("embedding column: {e}")))?;
        let chunk_id = u32::try_from(chunk_id)
            .map_err(|_| StoreError::Query(format!("chunk_id out of range: {chunk_id}")))?;

        Ok(Chunk {
            source,
            chunk_id,
            text,
            embedding: decode_blob(&blob),
        })
    }
}

fn ensure_parent_dir(url: &str) -> Result<(), StoreError> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn replace(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("Failed to begin transaction", e))?;

        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to clear collection: {e}")))?;

        let insert = format!(
            "INSERT INTO {} (source, chunk_id, text, embedding) VALUES (?1, ?2, ?3, ?4)",
            self.table
        );
        for chunk in &chunks {
            sqlx::query(&insert)
                .bind(&chunk.source)
                .bind(chunk.chunk_id as i64)
                .bind(&chunk.text)
                .bind(encode_blob(&chunk.embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("Failed to insert chunk: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to commit replace: {e}")))?;

        debug!(table = %self.table, count = chunks.len(), "Replaced collection");
        Ok(chunks.len())
    }

    async fn scan(&self) -> Result<Vec<Chunk>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT source, chunk_id, text, embedding FROM {} ORDER BY iid ASC",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("Scan failed", e))?;

        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("Count failed", e))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::Query(format!("count column: {e}")))?;
        Ok(count as usize)
    }
}
