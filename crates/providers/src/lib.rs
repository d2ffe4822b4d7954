//! Provider implementations for SupportDesk.
//!
//! Generation providers implement `supportdesk_core::Provider`; embedders
//! implement `supportdesk_core::Embedder`. The router builds both from
//! configuration.

pub mod embedding;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use embedding::{HashEmbedder, RemoteEmbedder};
#[cfg(feature = "local")]
pub use local::LocalEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryingProvider;
pub use router::{build_embedder, build_from_config};
