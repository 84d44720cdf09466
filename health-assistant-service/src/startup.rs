//! Application startup and lifecycle management.
//!
//! Wires configuration into the response policy (database and text provider
//! are injected, never global) and serves the HTTP API.

use crate::config::AssistantConfig;
use crate::handlers::{ai_assistant, assist, health_check, metrics::metrics, readiness_check};
use crate::middleware::http_metrics_middleware;
use crate::services::providers::build_provider;
use crate::services::{AssistantDb, PolicySettings, RecordStore, ResponsePolicy};
use axum::{
    http::{header, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<ResponsePolicy>,
    /// Present only when a database is configured; used by health checks.
    pub db: Option<AssistantDb>,
}

impl AppState {
    pub fn new(policy: Arc<ResponsePolicy>, db: Option<AssistantDb>) -> Self {
        Self { policy, db }
    }
}

pub fn policy_settings(config: &AssistantConfig) -> PolicySettings {
    PolicySettings {
        max_tokens: config.generator.max_tokens,
        generation_timeout: config.generator.timeout(),
        lookup_timeout: Duration::from_millis(config.context.lookup_timeout_ms),
        related_records_limit: config.context.related_records_limit,
    }
}

/// Connect the collaborators named in the configuration and build the policy.
pub async fn build_policy(
    config: &AssistantConfig,
) -> Result<(ResponsePolicy, Option<AssistantDb>), AppError> {
    let db = if config.mongodb.is_enabled() {
        Some(
            AssistantDb::connect(
                &config.mongodb.uri,
                &config.mongodb.database,
                &config.mongodb.records_collection,
            )
            .await?,
        )
    } else {
        tracing::info!("MONGODB_URI not set, patient record lookups disabled");
        None
    };

    // A generator that cannot be built degrades answers to the fallback table.
    let provider = build_provider(&config.generator).unwrap_or_else(|e| {
        tracing::warn!(
            provider = ?config.generator.provider,
            error = %e,
            "Failed to initialize text provider, answering from fallback table"
        );
        None
    });

    match provider.as_ref() {
        Some(p) => tracing::info!(
            provider = %p.name(),
            model = %config.generator.model,
            "Initialized text provider"
        ),
        None => tracing::info!("No text provider configured, answering from fallback table"),
    }

    let records = db
        .clone()
        .map(|db| Arc::new(db) as Arc<dyn RecordStore>);

    let policy = ResponsePolicy::new(records, provider, policy_settings(config));
    Ok((policy, db))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route("/api/ai-assistant", post(ai_assistant))
        .route("/api/v1/assist", post(assist))
        .route_layer(from_fn(http_metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AssistantConfig) -> Result<Self, AppError> {
        let (policy, db) = build_policy(&config).await?;

        if let Some(db) = db.as_ref() {
            if config.context.related_records_limit > 0 {
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
            }
        }

        // An unhealthy generator only degrades answers to the fallback table.
        if let Some(provider) = policy.provider() {
            if let Err(e) = provider.health_check().await {
                tracing::warn!(
                    provider = %provider.name(),
                    error = %e,
                    "Text provider health check failed, answers may use fallback responses"
                );
            }
        }

        let state = AppState::new(Arc::new(policy), db);

        // Bind HTTP listener (port 0 = random port for testing)
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Health assistant service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.http_listener, router).await
    }

    /// Run until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run_with_graceful_shutdown(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
