//! Provider router: builds the generation provider and the embedder from
//! configuration.
//!
//! Generation always goes through an OpenAI-compatible endpoint wrapped in a
//! [`RetryingProvider`]. Embedders are picked by `embedding.provider`.

use std::sync::Arc;
use std::time::Duration;
use supportdesk_config::AppConfig;
use supportdesk_core::embedding::Embedder;
use supportdesk_core::error::Error;
use supportdesk_core::provider::Provider;
use tracing::debug;
use crate::embedding::{HashEmbedder, RemoteEmbedder};
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryingProvider;

/// Backends that run without an API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

/// Build the raw OpenAI-compatible provider, without retries.
///
/// Fails fast when the backend needs an API key and none is configured.
pub fn build_base_provider(config: &AppConfig) -> Result<OpenAiCompatProvider, Error> {
    let generation = &config.generation;
    let name = generation.provider.as_str();

    let api_key = match (&generation.api_key, KEYLESS_PROVIDERS.contains(&name)) {
        (Some(key), _) if !key.trim().is_empty() => key.clone(),
        (_, true) => name.to_string(),
        _ => {
            return Err(Error::config(format!(
                "no API key for generation provider '{name}'; set SUPPORTDESK_API_KEY or \
                 OPENAI_API_KEY, or generation.api_key in config.toml"
            )));
        }
    };

    let base_url = match (&generation.base_url, default_base_url(name)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(Error::config(format!(
                "generation provider '{name}' needs generation.base_url"
            )));
        }
    };

    debug!(provider = name, base_url = %base_url, "Building generation provider");

    Ok(OpenAiCompatProvider::new(name, base_url, api_key)
        .with_timeout(Duration::from_secs(generation.timeout_secs.max(1))))
}

/// Build the generation provider from configuration, wrapped with retries.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, Error> {
    let generation = &config.generation;
    let base = build_base_provider(config)?;

    Ok(Arc::new(
        RetryingProvider::new(Arc::new(base))
            .with_max_retries(generation.max_retries)
            .with_backoff(Duration::from_millis(generation.retry_backoff_ms))
            .with_attempt_timeout(Duration::from_secs(generation.timeout_secs.max(1))),
    ))
}

/// Build the embedder selected by `embedding.provider`.
///
/// The remote embedder shares the generation provider's endpoint and key.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, Error> {
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(embedding.dimension))),
        "remote" => {
            let provider = build_from_config(config)?;
            Ok(Arc::new(RemoteEmbedder::new(provider, &embedding.model)))
        }
        "local" => build_local_embedder(&embedding.model),
        other => Err(Error::config(format!(
            "unknown embedding provider '{other}' (expected local, remote, or hash)"
        ))),
    }
}

#[cfg(feature = "local")]
fn build_local_embedder(model: &str) -> Result<Arc<dyn Embedder>, Error> {
    Ok(Arc::new(crate::local::LocalEmbedder::new(model)))
}

#[cfg(not(feature = "local"))]
fn build_local_embedder(_model: &str) -> Result<Arc<dyn Embedder>, Error> {
    Err(Error::config(
        "embedding.provider = \"local\" requires a build with the `local` feature; \
         rebuild with `--features local` or use \"remote\" or \"hash\"",
    ))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" | "llama.cpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}
