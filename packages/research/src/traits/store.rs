//! Storage traits for the Evidence Index and batch jobs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{evidence::EvidenceRecord, job::Job};

/// A full-text search hit with the engine's native rank.
///
/// `rank` is oriented so that larger is better, but it is NOT normalized;
/// callers min-max normalize across the result set.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub record: EvidenceRecord,
    pub rank: f64,
}

/// Persistent, full-text searchable store of evidence records.
///
/// Upserts are keyed by record id with last-write-wins on text fields,
/// except the stored text which is only replaced by a strictly longer one.
#[async_trait]
pub trait EvidenceIndex: Send + Sync {
    /// Insert or update a record.
    async fn upsert(&self, record: &EvidenceRecord) -> Result<()>;

    /// Upsert many records, returning how many were written.
    async fn upsert_batch(&self, records: &[EvidenceRecord]) -> Result<usize> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(records.len())
    }

    /// Get a record by id.
    async fn get(&self, id: &str) -> Result<Option<EvidenceRecord>>;

    /// OR-combined full-text search over title and text.
    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<IndexHit>>;

    /// Number of indexed records.
    async fn count(&self) -> Result<usize>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;
}

/// Persistence for batch ingestion jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &Job) -> Result<()>;

    async fn update_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// Most recently created first.
    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>>;
}
