//! Generation client: one system/user exchange with a text-generation
//! backend.
//!
//! Holds no conversation state: every call sends exactly two messages and
//! returns the trimmed completion text.

use std::sync::Arc;
use supportdesk_config::AppConfig;
use supportdesk_core::error::{Error, ProviderError};
use supportdesk_core::message::Message;
use supportdesk_core::provider::{Provider, ProviderRequest};
use tracing::debug;

/// Stateless single-turn completion client.
#[derive(Clone)]
pub struct GenerationClient {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Model identifier sent with every request
    model: String,

    /// Sampling temperature
    temperature: f32,

    /// Optional completion length cap
    max_tokens: Option<u32>,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Build from configuration: provider, retry policy, model, temperature.
    ///
    /// Fails when the configured backend needs an API key and none is set.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider = supportdesk_providers::build_from_config(config)?;
        let mut client = Self::new(provider, &config.generation.model)
            .with_temperature(config.generation.temperature);
        client.max_tokens = config.generation.max_tokens;
        Ok(client)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Send `system` and `user` as a two-message exchange; return the reply.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = system.len() + user.len(),
            "Requesting completion"
        );

        let response = self.provider.complete(request).await?;
        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(format!(
                "Model '{}' returned an empty completion",
                response.model
            ))
            .into());
        }

        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion received"
            );
        }

        Ok(text.to_string())
    }
}
