//! Provider retry: bounded retries with exponential backoff and per-attempt
//! timeouts.
//!
//! Wraps a single provider. Transient failures (rate limits, network faults,
//! timeouts, HTTP 5xx) are retried up to `max_retries` times; everything else
//! is returned immediately.

use async_trait::async_trait;
use supportdesk_core::error::ProviderError;
use supportdesk_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound for a single backoff sleep, including `Retry-After` hints.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A provider that retries transient failures of the wrapped provider.
pub struct RetryingProvider {
    inner: Arc<dyn supportdesk_core::Provider>,
    max_retries: u32,
    initial_backoff: Duration,
    attempt_timeout: Duration,
}

impl RetryingProvider {
    /// Wrap a provider with the default policy: 2 retries, 500ms initial
    /// backoff, 60s per attempt.
    pub fn new(inner: Arc<dyn supportdesk_core::Provider>) -> Self {
        Self {
            inner,
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Total attempts, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Sleep before retry number `retry` (0-based): `initial * 2^retry` plus
    /// up to 10% jitter, never shorter than the provider's `Retry-After`.
    fn backoff_for(&self, retry: u32, error: &ProviderError) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(MAX_BACKOFF);
        let jitter_cap = (base.as_millis() / 10) as u64;
        let jitter = if jitter_cap > 0 {
            Duration::from_millis(rand::random_range(0..=jitter_cap))
        } else {
            Duration::ZERO
        };
        let hinted = match error {
            ProviderError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs).min(MAX_BACKOFF)
            }
            _ => Duration::ZERO,
        };
        (base + jitter).max(hinted)
    }

    async fn attempt<T, F, Fut>(&self, op: &str, call: F) -> std::result::Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ProviderError>>,
    {
        let provider_name = self.inner.name().to_string();
        let mut retry = 0;

        loop {
            let result = match tokio::time::timeout(self.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    provider_name,
                    self.attempt_timeout.as_secs_f32()
                ))),
            };

            match result {
                Ok(value) => {
                    if retry > 0 {
                        info!(provider = %provider_name, op, attempt = retry + 1, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    let delay = self.backoff_for(retry, &e);
                    warn!(
                        provider = %provider_name,
                        op,
                        error = %e,
                        attempt = retry + 1,
                        total = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl supportdesk_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.attempt("complete", || self.inner.complete(request.clone()))
            .await
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        self.attempt("embed", || self.inner.embed(request.clone()))
            .await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
