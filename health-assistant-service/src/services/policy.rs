//! Response generation policy.
//!
//! Every answer goes through the same steps: assemble context, try the text
//! provider, fall back to the keyword table when generation is unavailable,
//! then make sure the medical-advice disclaimer is present. Apart from a
//! missing query, nothing in here surfaces an error to the caller.

use crate::models::{ContextBundle, ResponseResult};
use crate::services::metrics;
use crate::services::providers::{FinishReason, GenerationParams, ProviderError, TextProvider};
use crate::services::records::{RecordError, RecordStore};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use service_core::error::AppError;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Substring every returned response must contain (compared case-insensitively).
pub const DISCLAIMER_MARKER: &str = "consult a healthcare professional";

/// Appended when the generated or fallback text lacks [`DISCLAIMER_MARKER`].
pub const DISCLAIMER_SENTENCE: &str = "\n\n*This is general health information, not medical advice. Please consult a healthcare professional for personalized recommendations.*";

pub const SYSTEM_PROMPT: &str = "You are MedWallet AI, a helpful healthcare assistant. You provide general health information and guidance, but always remind users to consult healthcare professionals for personalized medical advice. You can help with:

- General health information
- Understanding medical terms
- Health tracking tips
- Wellness recommendations
- Medication reminders (general only)
- Symptom tracking guidance

IMPORTANT: Always include this disclaimer: \"This is not medical advice. Please consult a healthcare professional for personalized recommendations.\"

For medical emergencies, direct users to seek immediate professional help.";

/// Queries mentioning any of these get the medical-inquiry note.
const MEDICAL_KEYWORDS: [&str; 5] = ["symptoms", "diagnosis", "treatment", "medication", "health"];

const MEDICAL_INQUIRY_NOTE: &str = "This appears to be a medical inquiry. Please consult healthcare professionals for personalized advice.";

/// Keyword responder used when the model is unavailable. Order matters: the
/// first keyword found in the query wins.
pub const FALLBACK_RESPONSES: [(&str, &str); 4] = [
    (
        "symptoms",
        "I'm tracking your symptoms. Remember to consult a healthcare professional for proper diagnosis and treatment.",
    ),
    (
        "medication",
        "For medication questions, please consult your healthcare provider or pharmacist. I can help you track your medication schedule.",
    ),
    (
        "appointment",
        "I can help you schedule appointments and send reminders. Would you like me to check your upcoming appointments?",
    ),
    (
        "health",
        "I'm here to support your health journey. I can help track your wellness goals, remind you of check-ups, and provide general health information.",
    ),
];

pub const DEFAULT_FALLBACK_RESPONSE: &str = "I'm your MedWallet AI assistant. I can help you track your health, manage appointments, and provide general wellness information. How can I assist you today?";

/// Bounds for the provider's output length.
const MIN_OUTPUT_TOKENS: i32 = 150;
const MAX_OUTPUT_TOKENS: i32 = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssistError {
    #[error("No query provided")]
    MissingQuery,
}

impl From<AssistError> for AppError {
    fn from(err: AssistError) -> Self {
        AppError::BadRequest(anyhow::anyhow!(err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct PolicySettings {
    /// Requested output length, clamped to 150..=200 tokens.
    pub max_tokens: i32,
    pub generation_timeout: Duration,
    pub lookup_timeout: Duration,
    /// How many text-search hits to add as related records. 0 disables search.
    pub related_records_limit: i64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_tokens: MAX_OUTPUT_TOKENS,
            generation_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(2),
            related_records_limit: 0,
        }
    }
}

impl PolicySettings {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens.clamp(MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS),
            ..GenerationParams::default()
        }
    }
}

/// Answers health queries. Cheap to share: all state is behind `Arc`s or
/// immutable.
pub struct ResponsePolicy {
    records: Option<Arc<dyn RecordStore>>,
    provider: Option<Arc<dyn TextProvider>>,
    settings: PolicySettings,
}

impl ResponsePolicy {
    pub fn new(
        records: Option<Arc<dyn RecordStore>>,
        provider: Option<Arc<dyn TextProvider>>,
        settings: PolicySettings,
    ) -> Self {
        Self {
            records,
            provider,
            settings,
        }
    }

    /// Policy with neither database nor model: keyword fallback only.
    pub fn fallback_only() -> Self {
        Self::new(None, None, PolicySettings::default())
    }

    pub fn provider(&self) -> Option<&Arc<dyn TextProvider>> {
        self.provider.as_ref()
    }

    pub fn records(&self) -> Option<&Arc<dyn RecordStore>> {
        self.records.as_ref()
    }

    /// Entry-point check shared by the HTTP handler and the CLI. Only an
    /// absent or zero-length query is missing; whitespace is a real query.
    pub async fn answer(
        &self,
        query: Option<&str>,
        user_id: Option<&str>,
        extra_context: Option<&Value>,
    ) -> Result<ResponseResult, AssistError> {
        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return Err(AssistError::MissingQuery),
        };

        Ok(self.generate_response(query, user_id, extra_context).await)
    }

    /// Collect the auxiliary notes for a query. Lookup failures only drop the
    /// affected note.
    pub async fn build_context(&self, query: &str, user_id: Option<&str>) -> ContextBundle {
        let mut bundle = ContextBundle::new();
        let user_id = user_id.map(str::trim).filter(|id| !id.is_empty());

        if let (Some(store), Some(id)) = (self.records.as_deref(), user_id) {
            match self.bounded(store.find_by_id(id)).await {
                Ok(Some(record)) => {
                    if let Some(history) = record.history_text() {
                        bundle.push(format!("Patient medical history: {}", history));
                    }
                }
                Ok(None) => tracing::debug!("No patient record for supplied user id"),
                Err(e) => lookup_failed("find_by_id", &e),
            }
        }

        if self.settings.related_records_limit > 0 {
            if let Some(store) = self.records.as_deref() {
                match self
                    .bounded(store.search(query, self.settings.related_records_limit))
                    .await
                {
                    Ok(hits) => {
                        let histories: Vec<String> =
                            hits.iter().filter_map(|r| r.history_text()).collect();
                        if !histories.is_empty() {
                            bundle.push(format!("Related records: {}", histories.join("; ")));
                        }
                    }
                    Err(e) => lookup_failed("search", &e),
                }
            }
        }

        if is_medical_inquiry(query) {
            bundle.push(MEDICAL_INQUIRY_NOTE);
        }

        bundle
    }

    #[tracing::instrument(
        skip_all,
        fields(
            query_len = query.len(),
            source = tracing::field::Empty,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
            finish_reason = tracing::field::Empty,
        )
    )]
    pub async fn generate_response(
        &self,
        query: &str,
        user_id: Option<&str>,
        extra_context: Option<&Value>,
    ) -> ResponseResult {
        let mut context = self.build_context(query, user_id).await;

        if let Some(extra) = extra_context.filter(|v| is_truthy(v)) {
            context.push(format!("Additional context: {}", to_spaced_json(extra)));
        }

        let prompt = build_prompt(&context.render(), query);

        let (text, source) = match self.generate_text(&prompt).await {
            Ok(text) => (text, "model"),
            Err(e) => {
                tracing::warn!(error = %e, "Text generation unavailable, using fallback response");
                (generate_fallback(query).to_string(), "fallback")
            }
        };
        tracing::Span::current().record("source", source);
        metrics::record_response(source);

        let (response, appended) = ensure_disclaimer(text);
        if appended {
            metrics::record_disclaimer_appended();
        }

        ResponseResult {
            response,
            query: query.to_string(),
            context_used: !context.is_empty(),
            disclaimer_included: true,
        }
    }

    /// Model output with any echoed prompt removed. An empty continuation is
    /// still a successful generation.
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("No text provider".to_string()))?;

        let params = self.settings.generation_params();
        let timeout = self.settings.generation_timeout;
        let start = Instant::now();

        let outcome = match tokio::time::timeout(timeout, provider.generate(prompt, &params)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout.as_millis() as u64)),
        };
        metrics::record_provider_latency(provider.name(), start.elapsed().as_secs_f64());

        let text = outcome
            .and_then(|response| {
                let span = tracing::Span::current();
                span.record("input_tokens", response.input_tokens);
                span.record("output_tokens", response.output_tokens);
                span.record("finish_reason", response.finish_reason.as_str());
                metrics::record_provider_tokens(
                    provider.name(),
                    response.input_tokens,
                    response.output_tokens,
                );

                if response.finish_reason == FinishReason::Length {
                    tracing::debug!("Generation stopped at the output token limit");
                }

                response
                    .text
                    .map(|raw| strip_prompt_echo(&raw, prompt))
                    .ok_or_else(|| ProviderError::ApiError("No generated text".to_string()))
            })
            .inspect_err(|e| metrics::record_provider_error(provider.name(), e.kind()))?;

        Ok(text)
    }

    async fn bounded<T, F>(&self, lookup: F) -> Result<T, RecordError>
    where
        F: Future<Output = Result<T, RecordError>>,
    {
        let timeout = self.settings.lookup_timeout;
        match tokio::time::timeout(timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(RecordError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

fn lookup_failed(operation: &str, error: &RecordError) {
    tracing::warn!(operation, error = %error, "Patient record lookup failed, continuing without it");
    metrics::record_context_lookup_error(operation, error.kind());
}

fn is_medical_inquiry(query: &str) -> bool {
    let query = query.to_lowercase();
    MEDICAL_KEYWORDS.iter().any(|k| query.contains(k))
}

/// Python-style truthiness: null, false, 0, and empty strings/lists/objects
/// carry no context.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Writes JSON the way Python's `json.dumps` does by default: `", "` between
/// items, `": "` after keys and non-ASCII escaped as `\uXXXX`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn to_spaced_json(value: &Value) -> String {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, SpacedFormatter);
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buffer).unwrap_or_else(|_| value.to_string())
}

/// Canned answer for the first matching keyword, or the capability summary.
pub fn generate_fallback(query: &str) -> &'static str {
    let query = query.to_lowercase();
    FALLBACK_RESPONSES
        .iter()
        .find(|(keyword, _)| query.contains(keyword))
        .map(|(_, response)| *response)
        .unwrap_or(DEFAULT_FALLBACK_RESPONSE)
}

pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "{}\n\nContext: {}\n\nUser Query: {}\n\nResponse:",
        SYSTEM_PROMPT, context, query
    )
}

/// Drop the prompt when the backend echoes it in front of the continuation.
pub fn strip_prompt_echo(output: &str, prompt: &str) -> String {
    output.strip_prefix(prompt).unwrap_or(output).trim().to_string()
}

/// Returns the text with the disclaimer guaranteed, and whether it was appended.
pub fn ensure_disclaimer(text: String) -> (String, bool) {
    if text.to_lowercase().contains(DISCLAIMER_MARKER) {
        (text, false)
    } else {
        (text + DISCLAIMER_SENTENCE, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_first_declared_keyword_wins() {
        assert_eq!(
            generate_fallback("What are my symptoms today?"),
            FALLBACK_RESPONSES[0].1
        );
        // "health" appears first in the text but "symptoms" is declared first.
        assert_eq!(
            generate_fallback("health symptoms"),
            FALLBACK_RESPONSES[0].1
        );
        assert_eq!(
            generate_fallback("Is my MEDICATION bad for my health?"),
            FALLBACK_RESPONSES[1].1
        );
        assert_eq!(
            generate_fallback("book an appointment"),
            FALLBACK_RESPONSES[2].1
        );
    }

    #[test]
    fn fallback_default_for_unrelated_text() {
        assert_eq!(
            generate_fallback("random unrelated text"),
            DEFAULT_FALLBACK_RESPONSE
        );
        assert_eq!(generate_fallback(""), DEFAULT_FALLBACK_RESPONSE);
    }

    #[test]
    fn fallback_matches_substrings() {
        // "healthy" contains "health".
        assert_eq!(generate_fallback("eating healthy"), FALLBACK_RESPONSES[3].1);
    }

    #[test]
    fn disclaimer_appended_only_when_missing() {
        let (text, appended) = ensure_disclaimer("Drink water.".to_string());
        assert!(appended);
        assert_eq!(text, format!("Drink water.{}", DISCLAIMER_SENTENCE));

        let original = "Please CONSULT A HEALTHCARE PROFESSIONAL first.".to_string();
        let (text, appended) = ensure_disclaimer(original.clone());
        assert!(!appended);
        assert_eq!(text, original);
    }

    #[test]
    fn symptoms_fallback_already_carries_disclaimer() {
        let (_, appended) = ensure_disclaimer(FALLBACK_RESPONSES[0].1.to_string());
        assert!(!appended);

        // "consult your healthcare provider" is not the marker.
        let (_, appended) = ensure_disclaimer(FALLBACK_RESPONSES[1].1.to_string());
        assert!(appended);
    }

    #[test]
    fn strip_prompt_echo_removes_prefix_and_trims() {
        let prompt = build_prompt("", "hi");
        let output = format!("{}  Hello there. \n", prompt);
        assert_eq!(strip_prompt_echo(&output, &prompt), "Hello there.");
        assert_eq!(strip_prompt_echo(" Just text ", &prompt), "Just text");
    }

    #[test]
    fn prompt_layout() {
        let prompt = build_prompt("Patient medical history: asthma", "Can I run?");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with(
            "\n\nContext: Patient medical history: asthma\n\nUser Query: Can I run?\n\nResponse:"
        ));
    }

    #[test]
    fn medical_inquiry_detection_is_case_insensitive() {
        assert!(is_medical_inquiry("Treatment options for a cold"));
        assert!(is_medical_inquiry("my DIAGNOSIS"));
        assert!(!is_medical_inquiry("book an appointment"));
    }

    #[test]
    fn generation_params_clamp_output_length() {
        let mut settings = PolicySettings::default();
        assert_eq!(settings.generation_params().max_tokens, 200);

        settings.max_tokens = 1000;
        assert_eq!(settings.generation_params().max_tokens, 200);

        settings.max_tokens = 10;
        let params = settings.generation_params();
        assert_eq!(params.max_tokens, 150);
        assert_eq!(params.num_return_sequences, 1);
        assert_eq!(params.no_repeat_ngram_size, 2);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn extra_context_uses_python_json_spacing() {
        let value = serde_json::json!({"mood": "tired", "steps": [1, 2]});
        assert_eq!(to_spaced_json(&value), r#"{"mood": "tired", "steps": [1, 2]}"#);

        let value = serde_json::json!({"note": "café ☕ 😀"});
        assert_eq!(
            to_spaced_json(&value),
            r#"{"note": "caf\u00e9 \u2615 \ud83d\ude00"}"#
        );
        assert_eq!(to_spaced_json(&serde_json::json!({})), "{}");
    }

    #[test]
    fn truthiness_of_extra_context() {
        assert!(!is_truthy(&serde_json::json!({})));
        assert!(!is_truthy(&serde_json::json!(null)));
        assert!(!is_truthy(&serde_json::json!([])));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(is_truthy(&serde_json::json!({"previousMessages": []})));
    }
}
