//! Patient record lookups used to enrich the prompt.
//!
//! The response policy treats every lookup as best-effort: any
//! [`RecordError`] is logged and the corresponding note is left out.

pub mod memory;

use crate::models::PatientRecord;
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryRecordStore;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Record lookup timed out after {0} ms")]
    Timeout(u64),
}

impl RecordError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::Database(_) => "database",
            RecordError::Malformed(_) => "malformed",
            RecordError::Timeout(_) => "timeout",
        }
    }
}

impl From<mongodb::error::Error> for RecordError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            mongodb::error::ErrorKind::BsonDeserialization(ref e) => {
                RecordError::Malformed(e.to_string())
            }
            _ => RecordError::Database(err.to_string()),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a single record by identifier.
    async fn find_by_id(&self, id: &str) -> Result<Option<PatientRecord>, RecordError>;

    /// Relevance-ranked text search, best match first, at most `limit` hits.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PatientRecord>, RecordError>;

    async fn health_check(&self) -> Result<(), RecordError>;
}
