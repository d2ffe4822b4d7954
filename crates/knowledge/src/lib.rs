//! Knowledge stores, retrieval, and ingestion for SupportDesk.
//!
//! - [`chunker`] splits documents into overlapping word windows
//! - [`ingest`] turns a directory of `*.txt` files into stored chunks
//! - Stores implement `supportdesk_core::KnowledgeStore`
//! - [`Retriever`] finds the top-K chunks for a query, index first, scan
//!   as fallback

pub mod chunker;
pub mod in_memory;
pub mod ingest;
pub mod retriever;
pub mod vector;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod sql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use chunker::ChunkerConfig;
pub use in_memory::InMemoryKnowledgeStore;
pub use ingest::{Document, IngestReport, Ingestor};
pub use retriever::Retriever;
pub use vector::{dot, rank_top_k};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKnowledgeStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresKnowledgeStore;
