use super::{RecordError, RecordStore};
use crate::models::PatientRecord;
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory record store for tests and local runs.
///
/// `search` ranks by the number of query words found in the record's name and
/// history, which is close enough to a Mongo text score for fixtures.
pub struct MemoryRecordStore {
    records: Mutex<Vec<PatientRecord>>,
    unavailable: bool,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    /// A store whose every call fails, standing in for an unreachable database.
    pub fn unavailable() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn with_records(records: Vec<PatientRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            unavailable: false,
        }
    }

    pub fn insert(&self, record: PatientRecord) -> Result<(), RecordError> {
        self.lock()?.push(record);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<PatientRecord>>, RecordError> {
        if self.unavailable {
            return Err(RecordError::Database(
                "Memory record store unavailable".to_string(),
            ));
        }
        self.records
            .lock()
            .map_err(|e| RecordError::Database(format!("Record store mutex poisoned: {}", e)))
    }
}

fn score(record: &PatientRecord, terms: &[String]) -> usize {
    let haystack = format!(
        "{} {}",
        record.name.as_deref().unwrap_or_default(),
        record.history_text().unwrap_or_default()
    )
    .to_lowercase();

    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<PatientRecord>, RecordError> {
        let records = self.lock()?;
        Ok(records.iter().find(|r| r.id_string() == id).cloned())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PatientRecord>, RecordError> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let records = self.lock()?;
        let mut scored: Vec<(usize, &PatientRecord)> = records
            .iter()
            .map(|r| (score(r, &terms), r))
            .filter(|(s, _)| *s > 0)
            .collect();

        // Stable sort keeps insertion order between equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<(), RecordError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryRecordStore {
        MemoryRecordStore::with_records(vec![
            PatientRecord::new("p1").with_history("type 2 diabetes, managed with metformin"),
            PatientRecord::new("p2").with_history("seasonal asthma"),
            PatientRecord::new("p3").with_history("diabetes and asthma"),
        ])
    }

    #[tokio::test]
    async fn find_by_id_matches_string_ids() {
        let store = store();
        let found = store.find_by_id("p2").await.unwrap();
        assert_eq!(found.unwrap().history_text().as_deref(), Some("seasonal asthma"));
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_ranks_by_matching_terms_and_honours_limit() {
        let store = store();

        let hits = store.search("Diabetes? asthma", 10).await.unwrap();
        let ids: Vec<String> = hits.iter().map(|r| r.id_string()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);

        let hits = store.search("diabetes", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id_string(), "p1");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryRecordStore::unavailable();
        assert!(store.find_by_id("p1").await.is_err());
        assert!(store.search("diabetes", 5).await.is_err());
        assert!(store.health_check().await.is_err());
    }
}
