//! Prometheus metrics for health-assistant-service.
//!
//! Provides HTTP and assistant-specific metrics for observability.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Assistant metrics
pub static ASSISTANT_RESPONSES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ASSISTANT_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static ASSISTANT_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ASSISTANT_CONTEXT_LOOKUP_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ASSISTANT_DISCLAIMER_APPENDED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static ASSISTANT_PROVIDER_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Database metrics
pub static DB_OPERATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static DB_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup; later calls are no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["route", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["route"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    // source: model, fallback
    let responses = IntCounterVec::new(
        Opts::new(
            "assistant_responses_total",
            "Total assistant responses by source",
        ),
        &["source"],
    )
    .expect("Failed to create assistant_responses_total metric");

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "assistant_provider_latency_seconds",
            "Text provider latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider"],
    )
    .expect("Failed to create assistant_provider_latency_seconds metric");

    let provider_errors = IntCounterVec::new(
        Opts::new(
            "assistant_provider_errors_total",
            "Total text provider errors",
        ),
        &["provider", "error_type"],
    )
    .expect("Failed to create assistant_provider_errors_total metric");

    let lookup_errors = IntCounterVec::new(
        Opts::new(
            "assistant_context_lookup_errors_total",
            "Total failed patient record lookups",
        ),
        &["operation", "error_type"],
    )
    .expect("Failed to create assistant_context_lookup_errors_total metric");

    let disclaimer_appended = IntCounter::new(
        "assistant_disclaimer_appended_total",
        "Responses that needed the standard disclaimer appended",
    )
    .expect("Failed to create assistant_disclaimer_appended_total metric");

    // direction: input, output
    let provider_tokens = IntCounterVec::new(
        Opts::new(
            "assistant_provider_tokens_total",
            "Tokens reported by the text provider",
        ),
        &["provider", "direction"],
    )
    .expect("Failed to create assistant_provider_tokens_total metric");

    let db_duration = HistogramVec::new(
        HistogramOpts::new(
            "db_operation_duration_seconds",
            "Database operation duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation", "collection"],
    )
    .expect("Failed to create db_operation_duration_seconds metric");

    let db_errors = IntCounterVec::new(
        Opts::new("db_errors_total", "Total database errors"),
        &["operation", "collection"],
    )
    .expect("Failed to create db_errors_total metric");

    // Register all metrics
    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(responses.clone()))
        .expect("Failed to register assistant_responses_total");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register assistant_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register assistant_provider_errors_total");
    registry
        .register(Box::new(lookup_errors.clone()))
        .expect("Failed to register assistant_context_lookup_errors_total");
    registry
        .register(Box::new(disclaimer_appended.clone()))
        .expect("Failed to register assistant_disclaimer_appended_total");
    registry
        .register(Box::new(provider_tokens.clone()))
        .expect("Failed to register assistant_provider_tokens_total");
    registry
        .register(Box::new(db_duration.clone()))
        .expect("Failed to register db_operation_duration_seconds");
    registry
        .register(Box::new(db_errors.clone()))
        .expect("Failed to register db_errors_total");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = ASSISTANT_RESPONSES_TOTAL.set(responses);
    let _ = ASSISTANT_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = ASSISTANT_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = ASSISTANT_CONTEXT_LOOKUP_ERRORS_TOTAL.set(lookup_errors);
    let _ = ASSISTANT_DISCLAIMER_APPENDED_TOTAL.set(disclaimer_appended);
    let _ = ASSISTANT_PROVIDER_TOKENS_TOTAL.set(provider_tokens);
    let _ = DB_OPERATION_DURATION_SECONDS.set(db_duration);
    let _ = DB_ERRORS_TOTAL.set(db_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a completed HTTP request.
pub fn record_http_request(route: &str, status: u16, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        let status = status.to_string();
        counter.with_label_values(&[route, status.as_str()]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram.with_label_values(&[route]).observe(duration_secs);
    }
}

/// Record which path produced a response ("model" or "fallback").
pub fn record_response(source: &str) {
    if let Some(counter) = ASSISTANT_RESPONSES_TOTAL.get() {
        counter.with_label_values(&[source]).inc();
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, duration_secs: f64) {
    if let Some(histogram) = ASSISTANT_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = ASSISTANT_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record a failed record lookup that was dropped from the context.
pub fn record_context_lookup_error(operation: &str, error_type: &str) {
    if let Some(counter) = ASSISTANT_CONTEXT_LOOKUP_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation, error_type]).inc();
    }
}

/// Record token usage. Backends that report no usage send zeros.
pub fn record_provider_tokens(provider: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(counter) = ASSISTANT_PROVIDER_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[provider, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[provider, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

pub fn record_disclaimer_appended() {
    if let Some(counter) = ASSISTANT_DISCLAIMER_APPENDED_TOTAL.get() {
        counter.inc();
    }
}

/// Record database operation duration.
pub fn record_db_operation(operation: &str, collection: &str, duration_secs: f64) {
    if let Some(histogram) = DB_OPERATION_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation, collection])
            .observe(duration_secs);
    }
}

/// Record a database error.
pub fn record_db_error(operation: &str, collection: &str) {
    if let Some(counter) = DB_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation, collection]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_counters() {
        init_metrics();
        record_response("fallback");
        record_disclaimer_appended();
        record_provider_tokens("mock", 40, 12);

        let text = get_metrics();
        assert!(text.contains("assistant_responses_total"));
        assert!(text.contains(
            "assistant_provider_tokens_total{direction=\"output\",provider=\"mock\"}"
        ));
        assert!(text.contains("assistant_disclaimer_appended_total"));
    }
}
