//! Error types for the SupportDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all SupportDesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Knowledge store errors ---
    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying against the same backend.
    ///
    /// Rate limits, network faults, timeouts and 5xx responses are transient;
    /// authentication failures, 4xx responses and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::MalformedResponse(_) | Self::NotConfigured(_) => {
                false
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding model failed to load: {0}")]
    ModelLoad(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding backend returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool exhausted, IO).
    #[error("Knowledge store unavailable: {0}")]
    Unavailable(String),

    /// The store has no usable nearest-neighbour index (not built, not ready,
    /// or not supported by this backend).
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The query itself was rejected or its results could not be decoded.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl StoreError {
    /// Whether the retriever may recover from this error by scanning.
    ///
    /// Only availability problems qualify. Query and storage errors point at
    /// real bugs and must reach the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::IndexUnavailable(_))
    }
}
