//! Mock provider implementation for testing.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    /// Echo the prompt followed by a fixed reply, like a full-text pipeline.
    Echo(String),
    /// Return exactly this text.
    Reply(String),
    /// Fail every call.
    Fail,
    /// Sleep before replying.
    Slow(Duration, String),
}

/// Mock text provider for testing.
pub struct MockTextProvider {
    behavior: Behavior,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockTextProvider {
    /// Echoes the prompt, then a short generic reply.
    pub fn echoing() -> Self {
        Self::echoing_with("Stay hydrated and keep a regular sleep schedule.")
    }

    pub fn echoing_with(reply: &str) -> Self {
        Self::with_behavior(Behavior::Echo(reply.to_string()))
    }

    pub fn replying(reply: &str) -> Self {
        Self::with_behavior(Behavior::Reply(reply.to_string()))
    }

    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    pub fn slow(delay: Duration, reply: &str) -> Self {
        Self::with_behavior(Behavior::Slow(delay, reply.to_string()))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Number of `generate` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt passed to the most recent `generate` call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        let text = match &self.behavior {
            Behavior::Echo(reply) => format!("{} {}", prompt, reply),
            Behavior::Reply(reply) => reply.clone(),
            Behavior::Fail => {
                return Err(ProviderError::ApiError(
                    "Mock text provider failure".to_string(),
                ))
            }
            Behavior::Slow(delay, reply) => {
                tokio::time::sleep(*delay).await;
                reply.clone()
            }
        };

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text: Some(text),
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self.behavior {
            Behavior::Fail => Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
