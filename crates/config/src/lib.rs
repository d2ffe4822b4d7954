//! Configuration loading, validation, and management for SupportDesk.
//!
//! Loads configuration from `~/.supportdesk/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup so that a bad chunking stride or temperature never reaches the
//! pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.supportdesk/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation backend
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Knowledge store
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding model
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Offline ingestion job
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key for the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Backend kind: "openai", "openrouter", "ollama", or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override (required for "custom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Retries after the first attempt, transient failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff, doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind: "sqlite", "postgres", or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Connection URL. SQLite defaults to `~/.supportdesk/knowledge.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Table holding the chunk records
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Query the backend's vector index before falling back to a scan
    #[serde(default)]
    pub index_search: bool,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_collection() -> String {
    "kb_chunks".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            collection: default_collection(),
            index_search: false,
        }
    }
}

impl StoreConfig {
    /// The connection URL, with the SQLite default filled in.
    pub fn resolved_url(&self) -> Option<String> {
        match (&self.url, self.backend.as_str()) {
            (Some(url), _) => Some(url.clone()),
            (None, "sqlite") => Some(format!(
                "sqlite://{}",
                AppConfig::config_dir().join("knowledge.db").display()
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedder kind: "local", "remote", or "hash"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output dimension for the hashing embedder
    #[serde(default = "default_hash_dimension")]
    pub dimension: usize,

    /// Texts per embedding call during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "local".into()
}
fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}
fn default_hash_dimension() -> usize {
    384
}
fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_hash_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding the `*.txt` knowledge-base documents
    #[serde(default = "default_kb_dir")]
    pub kb_dir: PathBuf,

    /// Words per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_kb_dir() -> PathBuf {
    PathBuf::from("data/kb")
}
fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    120
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            kb_dir: default_kb_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `SUPPORTDESK_CONFIG` or the default path
    /// (`~/.supportdesk/config.toml`), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SUPPORTDESK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        Self::load_with_env(&path)
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without environment
    /// overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). The first name in each group that is set wins.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&'static str]| first_set(&lookup, keys);

        if let Some((_, key)) = first(&["SUPPORTDESK_API_KEY", "OPENAI_API_KEY"]) {
            self.generation.api_key = Some(key);
        }
        if let Some((_, provider)) = first(&["SUPPORTDESK_PROVIDER"]) {
            self.generation.provider = provider;
        }
        if let Some((_, model)) = first(&["SUPPORTDESK_MODEL", "LLM_MODEL"]) {
            self.generation.model = model;
        }
        if let Some((key, raw)) = first(&["SUPPORTDESK_TEMPERATURE", "LLM_TEMPERATURE"]) {
            self.generation.temperature = parse_var(key, &raw)?;
        }
        if let Some((_, url)) = first(&["SUPPORTDESK_STORE_URL"]) {
            if url.starts_with("postgres://") || url.starts_with("postgresql://") {
                self.store.backend = "postgres".into();
            } else if url.starts_with("sqlite:") {
                self.store.backend = "sqlite".into();
            }
            self.store.url = Some(url);
        }
        if let Some((_, collection)) = first(&["SUPPORTDESK_COLLECTION"]) {
            self.store.collection = collection;
        }
        if let Some((key, raw)) = first(&["SUPPORTDESK_INDEX_SEARCH", "USE_INDEX_SEARCH"]) {
            self.store.index_search = parse_bool(key, &raw)?;
        }
        if let Some((_, provider)) = first(&["SUPPORTDESK_EMBEDDING_PROVIDER"]) {
            self.embedding.provider = provider;
        }
        if let Some((_, model)) = first(&["SUPPORTDESK_EMBEDDING_MODEL", "EMBEDDING_MODEL"]) {
            self.embedding.model = model;
        }
        if let Some((key, raw)) = first(&["SUPPORTDESK_CHUNK_SIZE", "CHUNK_SIZE"]) {
            self.ingest.chunk_size = parse_var(key, &raw)?;
        }
        if let Some((key, raw)) = first(&["SUPPORTDESK_CHUNK_OVERLAP", "CHUNK_OVERLAP"]) {
            self.ingest.chunk_overlap = parse_var(key, &raw)?;
        }
        if let Some((key, raw)) = first(&["SUPPORTDESK_TOP_K", "TOP_K"]) {
            self.retrieval.top_k = parse_var(key, &raw)?;
        }
        if let Some((_, dir)) = first(&["SUPPORTDESK_KB_DIR", "KB_DIR"]) {
            self.ingest.kb_dir = PathBuf::from(dir);
        }
        if let Some((_, host)) = first(&["HOST"]) {
            self.gateway.host = host;
        }
        if let Some((key, raw)) = first(&["PORT"]) {
            self.gateway.port = parse_var(key, &raw)?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".supportdesk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.ingest.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.chunk_size must be > 0".into(),
            ));
        }

        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be >= 1".into(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be >= 1".into(),
            ));
        }

        if self.store.backend == "postgres" && self.store.url.is_none() {
            return Err(ConfigError::ValidationError(
                "store.url is required for the postgres backend".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn first_set<F>(lookup: &F, keys: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|k| lookup(k).map(|v| (*k, v)))
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has an invalid value: '{raw}'")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::ValidationError(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for supportdesk_core::Error {
    fn from(e: ConfigError) -> Self {
        supportdesk_core::Error::config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.store.collection, "kb_chunks");
        assert!(!config.store.index_search);
        assert_eq!(config.ingest.chunk_size, 800);
        assert_eq!(config.ingest.chunk_overlap, 120);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.gateway.host, "0.0.0.0");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.generation.model, config.generation.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.embedding.model, config.embedding.model);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[retrieval]
top_k = 8

[store]
index_search = true
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert!(config.store.index_search);
        assert_eq!(config.store.collection, "kb_chunks");
        assert_eq!(config.ingest.chunk_size, 800);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = AppConfig::default();
        config.ingest.chunk_size = 100;
        config.ingest.chunk_overlap = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn postgres_requires_url() {
        let mut config = AppConfig::default();
        config.store.backend = "postgres".into();
        assert!(config.validate().is_err());
        config.store.url = Some("postgres://localhost/kb".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.generation.provider, "openai");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 9100\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 9100);
    }

    #[test]
    fn unparsable_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("LLM_MODEL", "gpt-4o"),
                ("SUPPORTDESK_TEMPERATURE", "0.5"),
                ("USE_INDEX_SEARCH", "true"),
                ("SUPPORTDESK_TOP_K", "3"),
                ("PORT", "9000"),
                ("SUPPORTDESK_KB_DIR", "/srv/kb"),
            ]))
            .unwrap();
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.generation.model, "gpt-4o");
        assert!((config.generation.temperature - 0.5).abs() < f32::EPSILON);
        assert!(config.store.index_search);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.ingest.kb_dir, PathBuf::from("/srv/kb"));
    }

    #[test]
    fn prefixed_env_wins_over_legacy_name() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("SUPPORTDESK_MODEL", "primary"),
                ("LLM_MODEL", "legacy"),
                ("SUPPORTDESK_API_KEY", "sk-primary"),
                ("OPENAI_API_KEY", "sk-legacy"),
            ]))
            .unwrap();
        assert_eq!(config.generation.model, "primary");
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-primary"));
    }

    #[test]
    fn store_url_env_selects_backend() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[("SUPPORTDESK_STORE_URL", "postgres://db/kb")]))
            .unwrap();
        assert_eq!(config.store.backend, "postgres");
        assert_eq!(config.store.resolved_url().as_deref(), Some("postgres://db/kb"));
    }

    #[test]
    fn bad_env_value_is_validation_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("SUPPORTDESK_CHUNK_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("SUPPORTDESK_CHUNK_SIZE"));

        let err = config
            .apply_overrides(env(&[("USE_INDEX_SEARCH", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn sqlite_url_defaults_under_config_dir() {
        let config = AppConfig::default();
        let url = config.store.resolved_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("knowledge.db"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("kb_chunks"));
        assert!(!toml_str.contains("api_key"));
    }
}
