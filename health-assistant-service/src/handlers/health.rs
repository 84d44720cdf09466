use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness endpoint for Docker/K8s health checks.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let generator = state
        .policy
        .provider()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "fallback".to_string());

    let Some(db) = state.db.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "health-assistant-service",
                "version": env!("CARGO_PKG_VERSION"),
                "generator": generator,
                "database": "disabled"
            })),
        );
    };

    match db.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "health-assistant-service",
                "version": env!("CARGO_PKG_VERSION"),
                "generator": generator,
                "database": "ok"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "health-assistant-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness endpoint for K8s.
///
/// The generator is not checked: without it the service still answers from the
/// fallback table.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(records) = state.policy.records() else {
        return StatusCode::OK;
    };

    match records.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Record store not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
