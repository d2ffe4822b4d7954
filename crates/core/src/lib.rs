//! # SupportDesk Core
//!
//! Domain types, traits, and error definitions for the SupportDesk
//! retrieval-augmented support pipeline. This crate has **zero framework
//! dependencies**; it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: text generation
//! ([`Provider`]), embeddings ([`Embedder`]) and chunk storage
//! ([`KnowledgeStore`]). Implementations live in their respective crates and
//! are injected explicitly, so tests can substitute scripted doubles.

pub mod error;
pub mod message;
pub mod provider;
pub mod embedding;
pub mod knowledge;

// Re-export key types at crate root for ergonomics
pub use error::{EmbeddingError, Error, ProviderError, Result, StoreError};
pub use message::{Message, Role};
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage};
pub use embedding::Embedder;
pub use knowledge::{Chunk, IndexSearch, KnowledgeStore, RetrievedChunk};
