#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use health_assistant_service::models::PatientRecord;
use health_assistant_service::services::providers::mock::MockTextProvider;
use health_assistant_service::services::providers::TextProvider;
use health_assistant_service::services::records::MemoryRecordStore;
use health_assistant_service::services::{PolicySettings, RecordStore, ResponsePolicy};
use health_assistant_service::startup::{build_router, AppState};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const DIABETIC_USER_ID: &str = "user-diabetes";
pub const NO_HISTORY_USER_ID: &str = "user-no-history";

/// Marker every response must contain.
pub const DISCLAIMER: &str = "consult a healthcare professional";

pub fn seeded_store() -> Arc<MemoryRecordStore> {
    Arc::new(MemoryRecordStore::with_records(vec![
        PatientRecord::new(DIABETIC_USER_ID)
            .with_name("Ada")
            .with_history("diabetes"),
        PatientRecord::new(NO_HISTORY_USER_ID).with_name("Grace"),
        PatientRecord::new("user-asthma").with_history("seasonal asthma"),
    ]))
}

pub fn policy_with(
    store: Option<Arc<MemoryRecordStore>>,
    provider: Option<Arc<MockTextProvider>>,
    settings: PolicySettings,
) -> ResponsePolicy {
    ResponsePolicy::new(
        store.map(|s| s as Arc<dyn RecordStore>),
        provider.map(|p| p as Arc<dyn TextProvider>),
        settings,
    )
}

pub fn router_with(policy: ResponsePolicy) -> Router {
    build_router(AppState::new(Arc::new(policy), None))
}

pub fn has_disclaimer(text: &str) -> bool {
    text.to_lowercase().contains(DISCLAIMER)
}

pub async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
