//! Text generation provider abstractions and implementations.
//!
//! The response policy only depends on the [`TextProvider`] trait, so the
//! backing model (hosted Gemini, a text-generation-inference endpoint, or a
//! scripted mock) is chosen by configuration at startup.

pub mod gemini;
pub mod huggingface;
pub mod mock;

use crate::config::{GeneratorConfig, ProviderKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Generation timed out after {0} ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::Timeout(_) => "timeout",
        }
    }
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text. Some backends echo the prompt in front of it.
    pub text: Option<String>,

    /// Input tokens consumed. 0 when the backend does not report usage.
    pub input_tokens: i32,

    /// Output tokens generated. 0 when the backend does not report usage.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    /// Hit the output token limit.
    Length,
    ContentFilter,
    /// The backend answered without any generated text.
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "complete",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Error => "error",
        }
    }
}

/// Generation parameters for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f32,

    /// Maximum output tokens.
    pub max_tokens: i32,

    /// Number of candidates to sample. Only the first is used.
    pub num_return_sequences: i32,

    /// Size of n-grams that may not repeat in the output.
    pub no_repeat_ngram_size: i32,

    /// Whether to sample rather than decode greedily.
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 200,
            num_return_sequences: 1,
            no_repeat_ngram_size: 2,
            do_sample: true,
        }
    }
}

/// Trait for text generation providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name used in logs and metrics.
    fn name(&self) -> &str;

    /// Generate a text response for the full prompt.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Build the configured provider, or `None` when generation is disabled.
pub fn build_provider(
    config: &GeneratorConfig,
) -> Result<Option<Arc<dyn TextProvider>>, ProviderError> {
    let provider: Arc<dyn TextProvider> = match config.provider {
        ProviderKind::None => return Ok(None),
        ProviderKind::Gemini => Arc::new(gemini::GeminiTextProvider::new(
            gemini::GeminiConfig {
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                timeout_secs: config.timeout_secs,
            },
        )?),
        ProviderKind::HuggingFace => Arc::new(huggingface::HuggingFaceTextProvider::new(
            huggingface::HuggingFaceConfig {
                endpoint: config.endpoint.clone(),
                api_key: config.api_key.clone(),
                timeout_secs: config.timeout_secs,
            },
        )?),
        ProviderKind::Mock => Arc::new(mock::MockTextProvider::echoing()),
    };

    Ok(Some(provider))
}
