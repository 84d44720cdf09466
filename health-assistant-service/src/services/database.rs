//! Database access for the health assistant.
//!
//! Reads patient records from MongoDB. The assistant never writes records;
//! the only schema concern here is the text index used for related-record
//! search.

use crate::models::PatientRecord;
use crate::services::metrics;
use crate::services::records::{RecordError, RecordStore};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Instant;

#[derive(Clone)]
pub struct AssistantDb {
    client: MongoClient,
    db: Database,
    records_collection: String,
}

impl AssistantDb {
    pub async fn connect(
        uri: &str,
        database: &str,
        records_collection: &str,
    ) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(
            database = %database,
            collection = %records_collection,
            "Successfully connected to MongoDB database"
        );
        Ok(Self {
            client,
            db,
            records_collection: records_collection.to_string(),
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for health-assistant-service");

        // Text index backing related-record search
        let text_index = IndexModel::builder()
            .keys(doc! { "medicalHistory": "text", "name": "text" })
            .options(
                IndexOptions::builder()
                    .name("records_text_idx".to_string())
                    .build(),
            )
            .build();

        self.records()
            .create_index(text_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create records text index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub fn records(&self) -> Collection<PatientRecord> {
        self.db.collection(&self.records_collection)
    }
}

/// Identifiers arrive as strings; records may carry an ObjectId or a string `_id`.
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "$or": [ { "_id": oid }, { "_id": id } ] },
        Err(_) => doc! { "_id": id },
    }
}

#[async_trait]
impl RecordStore for AssistantDb {
    async fn find_by_id(&self, id: &str) -> Result<Option<PatientRecord>, RecordError> {
        let start = Instant::now();
        let result = self.records().find_one(id_filter(id), None).await;
        metrics::record_db_operation(
            "find_one",
            &self.records_collection,
            start.elapsed().as_secs_f64(),
        );

        result.map_err(|e| {
            metrics::record_db_error("find_one", &self.records_collection);
            RecordError::from(e)
        })
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PatientRecord>, RecordError> {
        let start = Instant::now();
        let options = FindOptions::builder()
            .projection(doc! { "score": { "$meta": "textScore" } })
            .sort(doc! { "score": { "$meta": "textScore" } })
            .limit(limit)
            .build();

        let result: Result<Vec<PatientRecord>, mongodb::error::Error> = async {
            let cursor = self
                .records()
                .find(doc! { "$text": { "$search": query } }, options)
                .await?;
            cursor.try_collect().await
        }
        .await;

        metrics::record_db_operation(
            "text_search",
            &self.records_collection,
            start.elapsed().as_secs_f64(),
        );

        result.map_err(|e| {
            metrics::record_db_error("text_search", &self.records_collection);
            RecordError::from(e)
        })
    }

    async fn health_check(&self) -> Result<(), RecordError> {
        self.ping()
            .await
            .map_err(|e| RecordError::Database(e.to_string()))
    }
}
