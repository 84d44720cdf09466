//! Hugging Face text-generation provider.
//!
//! Talks to a text-generation-inference server or the hosted Inference API
//! serving a conversational model such as `microsoft/DialoGPT-medium`. The
//! pipeline is asked for the full text, so the output starts with the prompt;
//! the response policy strips that echo.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;

/// Hugging Face provider configuration.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Full URL of the generation endpoint.
    pub endpoint: String,
    /// Optional bearer token. Empty for an unauthenticated local server.
    pub api_key: String,
    pub timeout_secs: u64,
}

pub struct HuggingFaceTextProvider {
    config: HuggingFaceConfig,
    client: Client,
}

impl HuggingFaceTextProvider {
    pub fn new(config: HuggingFaceConfig) -> Result<Self, ProviderError> {
        if config.endpoint.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Text generation endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn build_request<'a>(&self, prompt: &'a str, params: &GenerationParams) -> GenerateRequest<'a> {
        GenerateRequest {
            inputs: prompt,
            parameters: Parameters {
                max_new_tokens: params.max_tokens,
                temperature: params.temperature,
                do_sample: params.do_sample,
                num_return_sequences: params.num_return_sequences,
                no_repeat_ngram_size: params.no_repeat_ngram_size,
                return_full_text: true,
            },
        }
    }
}

#[async_trait]
impl TextProvider for HuggingFaceTextProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(prompt, params);

        tracing::debug!(
            endpoint = %self.config.endpoint,
            prompt_len = prompt.len(),
            "Sending request to text generation endpoint"
        );

        let mut builder = self.client.traced_post(&self.config.endpoint).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                429 => ProviderError::RateLimited,
                400 | 422 => ProviderError::InvalidRequest(error_text),
                // The hosted API answers 503 while the model is still loading.
                503 => ProviderError::NotConfigured(format!("Model unavailable: {}", error_text)),
                _ => ProviderError::ApiError(format!(
                    "Text generation error {}: {}",
                    status, error_text
                )),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = body.into_first_text();

        Ok(ProviderResponse {
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: if text.is_some() {
                FinishReason::Complete
            } else {
                FinishReason::Error
            },
            text,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // text-generation-inference exposes /health next to /generate.
        let url = match self.config.endpoint.rsplit_once('/') {
            Some((base, "generate")) => format!("{}/health", base),
            _ => self.config.endpoint.clone(),
        };

        let response = self
            .client
            .traced_get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Parameters {
    max_new_tokens: i32,
    temperature: f32,
    do_sample: bool,
    num_return_sequences: i32,
    no_repeat_ngram_size: i32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// TGI answers with a single object, the Inference API with a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(Generation),
    Batch(Vec<Generation>),
}

impl GenerateResponse {
    fn into_first_text(self) -> Option<String> {
        match self {
            GenerateResponse::Single(g) => Some(g.generated_text),
            GenerateResponse::Batch(list) => list.into_iter().next().map(|g| g.generated_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> HuggingFaceTextProvider {
        HuggingFaceTextProvider::new(HuggingFaceConfig {
            endpoint: "http://localhost:8080/generate".to_string(),
            api_key: String::new(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn empty_endpoint_is_not_configured() {
        let result = HuggingFaceTextProvider::new(HuggingFaceConfig {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn request_carries_pipeline_parameters() {
        let provider = provider();
        let request = provider.build_request("hello", &GenerationParams::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["inputs"], "hello");
        assert_eq!(json["parameters"]["max_new_tokens"], 200);
        assert_eq!(json["parameters"]["num_return_sequences"], 1);
        assert_eq!(json["parameters"]["no_repeat_ngram_size"], 2);
        assert_eq!(json["parameters"]["do_sample"], true);
        assert_eq!(json["parameters"]["return_full_text"], true);
    }

    #[test]
    fn parses_single_and_batch_responses() {
        let single: GenerateResponse =
            serde_json::from_str(r#"{"generated_text": "one"}"#).unwrap();
        assert_eq!(single.into_first_text().as_deref(), Some("one"));

        let batch: GenerateResponse =
            serde_json::from_str(r#"[{"generated_text": "first"}, {"generated_text": "second"}]"#)
                .unwrap();
        assert_eq!(batch.into_first_text().as_deref(), Some("first"));

        let empty: GenerateResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_first_text(), None);
    }
}
