//! Persisted-store contracts (spec §6 "Persisted state layout").
//!
//! Typed repository traits over the relational tables the spec enumerates
//! (`datasets`, `graphs`, plus the entity tables folded into `Dataset`
//! itself). Only an in-memory double ships here; a concrete SQL driver is
//! out of scope for this crate the way the teacher keeps its own storage
//! backend behind a trait object.

use crate::model::Dataset;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One row of the `datasets` table (spec §6).
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub id: String,
    pub version: u64,
    pub source_type: String,
    pub quality_score: f64,
    pub stop_count: usize,
    pub route_count: usize,
    pub flight_count: usize,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl DatasetRecord {
    pub fn from_dataset(id: impl Into<String>, version: u64, dataset: &Dataset, content_hash: String) -> Self {
        DatasetRecord {
            id: id.into(),
            version,
            source_type: dataset.source.clone(),
            quality_score: dataset.quality,
            stop_count: dataset.stops.len(),
            route_count: dataset.routes.len(),
            flight_count: dataset.flights.len(),
            content_hash,
            created_at: dataset.loaded_at,
            is_active: true,
        }
    }
}

/// Repository over `datasets` rows, keyed by the logical dataset id (the
/// cache key is reused as the row id).
#[async_trait]
pub trait DatasetRepository: Send + Sync {
    async fn latest(&self, id: &str) -> Option<DatasetRecord>;
    async fn insert(&self, record: DatasetRecord) -> Result<(), DbError>;
    /// Deletes the most recently inserted record for `id`, used to roll
    /// back a partial sync-worker batch (spec §4.11 failure model).
    async fn rollback_latest(&self, id: &str) -> Result<(), DbError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage operation failed: {0}")]
    Storage(String),
}

/// Process-local double used by tests and by deployments that run without
/// a relational store. Keeps only the current and previous record per id,
/// which is all `rollback_latest` needs.
#[derive(Default)]
pub struct InMemoryDatasetRepository {
    rows: RwLock<HashMap<String, Vec<DatasetRecord>>>,
}

impl InMemoryDatasetRepository {
    pub fn new() -> Self {
        InMemoryDatasetRepository { rows: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl DatasetRepository for InMemoryDatasetRepository {
    async fn latest(&self, id: &str) -> Option<DatasetRecord> {
        let rows = self.rows.read().await;
        rows.get(id).and_then(|history| history.last().cloned())
    }

    async fn insert(&self, record: DatasetRecord) -> Result<(), DbError> {
        let mut rows = self.rows.write().await;
        rows.entry(record.id.clone()).or_default().push(record);
        Ok(())
    }

    async fn rollback_latest(&self, id: &str) -> Result<(), DbError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(id) {
            Some(history) if !history.is_empty() => {
                history.pop();
                Ok(())
            }
            _ => Err(DbError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, hash: &str) -> DatasetRecord {
        DatasetRecord {
            id: id.to_string(),
            version: 1,
            source_type: "fallback".to_string(),
            quality_score: 100.0,
            stop_count: 0,
            route_count: 0,
            flight_count: 0,
            content_hash: hash.to_string(),
            created_at: Utc::now(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn latest_returns_most_recently_inserted() {
        let repo = InMemoryDatasetRepository::new();
        repo.insert(record("d1", "hash-a")).await.unwrap();
        repo.insert(record("d1", "hash-b")).await.unwrap();

        let latest = repo.latest("d1").await.unwrap();
        assert_eq!(latest.content_hash, "hash-b");
    }

    #[tokio::test]
    async fn rollback_removes_last_insert() {
        let repo = InMemoryDatasetRepository::new();
        repo.insert(record("d1", "hash-a")).await.unwrap();
        repo.insert(record("d1", "hash-b")).await.unwrap();

        repo.rollback_latest("d1").await.unwrap();
        let latest = repo.latest("d1").await.unwrap();
        assert_eq!(latest.content_hash, "hash-a");
    }

    #[tokio::test]
    async fn rollback_on_empty_history_is_not_found() {
        let repo = InMemoryDatasetRepository::new();
        let err = repo.rollback_latest("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
