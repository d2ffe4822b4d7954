//! Helpers shared by the SQL-backed stores.

use supportdesk_core::error::StoreError;

/// Check that a collection name is a plain SQL identifier, since it is
/// interpolated into statements.
pub(crate) fn validate_table_name(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 63 {
        Ok(name.to_string())
    } else {
        Err(StoreError::Storage(format!(
            "Invalid collection name '{name}': use letters, digits and underscores"
        )))
    }
}

/// Classify a driver error. Connectivity failures are `Unavailable` so the
/// retriever may fall back; everything else is a query failure.
pub(crate) fn classify(context: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(format!("{context}: {e}")),
        _ => StoreError::Query(format!("{context}: {e}")),
    }
}

/// Encode an embedding as a little-endian f32 blob.
#[cfg(feature = "sqlite")]
pub(crate) fn encode_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob.
#[cfg(feature = "sqlite")]
pub(crate) fn decode_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Render an embedding as a pgvector literal: `[0.1,0.2,...]`.
#[cfg(feature = "postgres")]
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Parse a pgvector text literal back into floats.
#[cfg(feature = "postgres")]
pub(crate) fn parse_vector_literal(text: &str) -> Result<Vec<f32>, StoreError> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| StoreError::Query(format!("Bad vector component '{v}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(validate_table_name("kb_chunks").is_ok());
        assert!(validate_table_name("_kb2").is_ok());
        assert!(validate_table_name("2kb").is_err());
        assert!(validate_table_name("kb; DROP TABLE x").is_err());
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn pool_timeout_is_unavailable() {
        assert!(classify("scan", sqlx::Error::PoolTimedOut).is_transient());
        assert!(!classify("scan", sqlx::Error::RowNotFound).is_transient());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn blob_roundtrip_preserves_values() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_blob(&encode_blob(&v)), v);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn vector_literal_format() {
        assert_eq!(vector_literal(&[0.5, -1.0]), "[0.5,-1]");
        assert_eq!(parse_vector_literal("[0.5,-1]").unwrap(), vec![0.5, -1.0]);
        assert!(parse_vector_literal("[]").unwrap().is_empty());
        assert!(parse_vector_literal("[a]").is_err());
    }
}
