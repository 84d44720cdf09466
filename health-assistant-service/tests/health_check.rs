//! Integration tests against a live MongoDB.
//!
//! These tests require MongoDB to be running on localhost:27017.
//! Run with: cargo test -p health-assistant-service --test health_check -- --ignored

use health_assistant_service::config::AssistantConfig;
use health_assistant_service::models::PatientRecord;
use health_assistant_service::services::{AssistantDb, RecordStore};
use health_assistant_service::startup::Application;
use mongodb::bson::oid::ObjectId;
use reqwest::Client;
use std::time::Duration;

const MONGODB_URI: &str = "mongodb://localhost:27017";

fn test_database() -> String {
    format!("health_assistant_test_{}", uuid::Uuid::new_v4().simple())
}

fn skip_mongo() -> bool {
    if std::env::var("SKIP_MONGO_TESTS").is_ok() {
        eprintln!("Skipping test: SKIP_MONGO_TESTS is set");
        return true;
    }
    false
}

/// Spawn the application on a random port and return the port number.
async fn spawn_app(database: &str) -> u16 {
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("APP__PORT", "0"); // Random port
    std::env::set_var("MONGODB_URI", MONGODB_URI);
    std::env::set_var("MONGODB_DATABASE", database);
    std::env::set_var("RECORDS_COLLECTION", "patients");
    std::env::set_var("GENERATOR_PROVIDER", "mock");

    let config = AssistantConfig::load().expect("Failed to load config");
    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let port = app.http_port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    port
}

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn health_check_reports_database() {
    if skip_mongo() {
        return;
    }

    let port = spawn_app(&test_database()).await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "health-assistant-service");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["generator"], "mock");
}

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn readiness_check_returns_ok() {
    if skip_mongo() {
        return;
    }

    let port = spawn_app(&test_database()).await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/ready", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore = "Requires MongoDB"]
async fn records_are_found_by_object_id_and_string_id() {
    if skip_mongo() {
        return;
    }

    let db = AssistantDb::connect(MONGODB_URI, &test_database(), "users")
        .await
        .expect("Failed to connect");

    let oid = ObjectId::new();
    let mut by_oid = PatientRecord::new("placeholder").with_history("hypertension");
    by_oid.id = oid.into();
    let by_string = PatientRecord::new("legacy-user-7").with_history(vec![
        mongodb::bson::Bson::String("asthma".to_string()),
        mongodb::bson::Bson::String("eczema".to_string()),
    ]);

    db.records()
        .insert_many(vec![by_oid, by_string], None)
        .await
        .expect("Failed to seed records");

    let found = db
        .find_by_id(&oid.to_hex())
        .await
        .expect("Lookup failed")
        .expect("Record missing");
    assert_eq!(found.history_text().as_deref(), Some("hypertension"));

    let found = db
        .find_by_id("legacy-user-7")
        .await
        .expect("Lookup failed")
        .expect("Record missing");
    assert_eq!(found.history_text().as_deref(), Some("asthma, eczema"));

    assert!(db.find_by_id("nobody").await.expect("Lookup failed").is_none());
}
