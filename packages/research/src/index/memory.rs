//! In-memory Evidence Index and job store for testing and one-shot runs.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::merge_upsert;
use crate::error::{ResearchError, Result};
use crate::scoring::bm25_lite;
use crate::traits::store::{EvidenceIndex, IndexHit, JobStore};
use crate::types::config::ScoringWeights;
use crate::types::evidence::EvidenceRecord;
use crate::types::job::Job;

/// Evidence and jobs held in process memory. Data is lost on restart.
#[derive(Default)]
pub struct MemoryEvidenceIndex {
    records: RwLock<IndexMap<String, EvidenceRecord>>,
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryEvidenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl EvidenceIndex for MemoryEvidenceIndex {
    async fn upsert(&self, record: &EvidenceRecord) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let merged = match records.get(&record.id) {
            Some(existing) => merge_upsert(existing, record),
            None => record.clone(),
        };
        records.insert(record.id.clone(), merged);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<EvidenceRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<IndexHit>> {
        let weights = ScoringWeights::default();
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let mut hits: Vec<IndexHit> = records
            .values()
            .filter_map(|record| {
                let rank = bm25_lite(&format!("{} {}", record.title, record.text), terms, &weights);
                (rank > 0.0).then(|| IndexHit {
                    record: record.clone(),
                    rank,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    async fn clear(&self) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryEvidenceIndex {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(ResearchError::JobNotFound(job.id)),
        }
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::evidence::EvidenceSource;

    fn record(id: &str, text: &str) -> EvidenceRecord {
        EvidenceRecord::new(EvidenceSource::Archive, id, "Notice", "https://nla.gov.au/x")
            .with_snippet(text)
            .with_text(text)
    }

    #[tokio::test]
    async fn test_upsert_keeps_longer_text() {
        let index = MemoryEvidenceIndex::new();
        index.upsert(&record("1", "Ashby ferry timetable for 1912.")).await.unwrap();
        index.upsert(&record("1", "Ferry.")).await.unwrap();
        let stored = index.get("ARCHIVE:1").await.unwrap().unwrap();
        assert_eq!(stored.text, "Ashby ferry timetable for 1912.");

        index
            .upsert(&record("1", "Ashby ferry timetable for 1912, revised in 1913."))
            .await
            .unwrap();
        let stored = index.get("ARCHIVE:1").await.unwrap().unwrap();
        assert_eq!(stored.text, "Ashby ferry timetable for 1912, revised in 1913.");
    }

    #[tokio::test]
    async fn test_search_or_combines_terms() {
        let index = MemoryEvidenceIndex::new();
        index.upsert(&record("1", "Ashby ferry")).await.unwrap();
        index.upsert(&record("2", "Harwood council")).await.unwrap();
        index.upsert(&record("3", "Sugar mill")).await.unwrap();

        let terms = vec!["ferry".to_string(), "harwood".to_string()];
        let hits = index.search(&terms, 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
