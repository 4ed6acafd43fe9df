//! Batch job orchestrator.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::archive::{ArchiveClient, ArchiveQuery};
use crate::error::{ResearchError, Result};
use crate::traits::store::{EvidenceIndex, JobStore};
use crate::types::job::Job;

/// What to ingest.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub query: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<String>,

    /// Page bound; the ingest config default when `None`
    pub max_pages: Option<u32>,
}

impl JobRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// A submitted job and its running task.
pub struct JobHandle {
    /// Snapshot taken at submission (always `queued`)
    pub job: Job,
    task: JoinHandle<Job>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.job.id
    }

    /// Wait for the task and return the terminal job.
    pub async fn join(self) -> Result<Job> {
        let id = self.job.id;
        self.task.await.map_err(|e| ResearchError::JobFatal {
            job_id: id,
            message: format!("job task aborted: {e}"),
        })
    }
}

/// Drives paged archive ingestion into the Evidence Index.
#[derive(Clone)]
pub struct BatchOrchestrator {
    archive: ArchiveClient,
    index: Arc<dyn EvidenceIndex>,
    jobs: Arc<dyn JobStore>,
}

impl BatchOrchestrator {
    pub fn new(archive: ArchiveClient, index: Arc<dyn EvidenceIndex>, jobs: Arc<dyn JobStore>) -> Self {
        Self {
            archive,
            index,
            jobs,
        }
    }

    /// Persist a queued job and start its ingestion task.
    pub async fn submit(&self, request: JobRequest) -> Result<JobHandle> {
        let max_pages = request
            .max_pages
            .unwrap_or(self.archive.config().max_pages);
        let mut job = Job::new(request.query, max_pages).with_years(request.year_from, request.year_to);
        if let Some(region) = request.region {
            job = job.with_region(region);
        }

        self.jobs.insert_job(&job).await?;
        info!(job_id = %job.id, query = %job.query, max_pages = job.max_pages, "Job queued");

        let worker = self.clone();
        let owned = job.clone();
        let task = tokio::spawn(async move { worker.run(owned).await });

        Ok(JobHandle { job, task })
    }

    /// Run a job to completion on the current task.
    ///
    /// The returned job is terminal (`done` or `error`).
    pub async fn run(&self, mut job: Job) -> Job {
        if let Err(e) = job.mark_running() {
            warn!(job_id = %job.id, error = %e, "Job not runnable");
            return job;
        }
        self.persist(&job).await;
        info!(job_id = %job.id, "Job running");

        match self.ingest(&mut job).await {
            Ok(records) => {
                if let Err(e) = job.mark_done() {
                    warn!(job_id = %job.id, error = %e, "Could not mark job done");
                }
                info!(job_id = %job.id, records, "Job done");
            }
            Err(e) => {
                let fatal = ResearchError::JobFatal {
                    job_id: job.id,
                    message: e.to_string(),
                };
                error!(job_id = %job.id, progress = job.progress_pct, error = %fatal, "Job failed");
                if let Err(e) = job.mark_error(e.to_string()) {
                    warn!(job_id = %job.id, error = %e, "Could not mark job failed");
                }
            }
        }

        self.persist(&job).await;
        job
    }

    /// Page through the archive, upserting every record.
    async fn ingest(&self, job: &mut Job) -> Result<usize> {
        let mut token: Option<String> = None;
        let mut region = job.region.clone();
        let mut ingested = 0;

        for page in 0..job.max_pages {
            let result = self
                .archive
                .search(
                    ArchiveQuery::new(&job.query)
                        .years(job.year_from, job.year_to)
                        .region(region.as_deref())
                        .page_token(token.as_deref()),
                )
                .await?;

            if result.region_dropped {
                // Later pages must match the query the token was issued for.
                region = None;
            }
            if result.records.is_empty() {
                debug!(job_id = %job.id, page, "Empty page, stopping");
                break;
            }

            ingested += self.index.upsert_batch(&result.records).await?;
            job.set_progress(f64::from(page + 1) / f64::from(job.max_pages));
            self.jobs.update_job(job).await?;
            debug!(job_id = %job.id, page, ingested, progress = job.progress_pct, "Page ingested");

            match result.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(ingested)
    }

    async fn persist(&self, job: &Job) {
        if let Err(e) = self.jobs.update_job(job).await {
            error!(job_id = %job.id, status = %job.status, error = %e, "Failed to persist job");
        }
    }

    /// Current snapshot of a job.
    pub async fn status(&self, id: Uuid) -> Result<Job> {
        self.jobs
            .get_job(id)
            .await?
            .ok_or(ResearchError::JobNotFound(id))
    }

    /// Poll until the job is terminal or `timeout` passes.
    pub async fn wait_for(&self, id: Uuid, poll: Duration, timeout: Duration) -> Result<Job> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.status(id).await?;
            if job.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Job>> {
        self.jobs.list_jobs(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryEvidenceIndex;
    use crate::testing::MockArchive;
    use crate::types::job::JobStatus;
    use serde_json::json;

    fn article(id: u32) -> serde_json::Value {
        json!({"id": id.to_string(), "heading": format!("Ferry notice {id}"), "troveUrl": format!("https://nla.gov.au/{id}")})
    }

    fn orchestrator(archive: MockArchive) -> (BatchOrchestrator, Arc<MemoryEvidenceIndex>) {
        let store = Arc::new(MemoryEvidenceIndex::new());
        let orchestrator = BatchOrchestrator::new(
            ArchiveClient::new(Arc::new(archive)),
            store.clone(),
            store.clone(),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_job_runs_to_done() {
        let archive = MockArchive::new()
            .with_page(None, vec![article(1), article(2)], Some("p2"))
            .with_page(Some("p2"), vec![article(3)], None);
        let (orchestrator, store) = orchestrator(archive);

        let handle = orchestrator
            .submit(JobRequest::new("ferry").with_max_pages(5))
            .await
            .unwrap();
        assert_eq!(handle.job.status, JobStatus::Queued);

        let job = handle.join().await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress_pct, 100);
        assert_eq!(store.count().await.unwrap(), 3);

        let stored = orchestrator.status(job.id).await.unwrap();
        assert_eq!(stored, job);
    }

    #[tokio::test]
    async fn test_respects_max_pages() {
        let archive = MockArchive::new()
            .with_page(None, vec![article(1)], Some("p2"))
            .with_page(Some("p2"), vec![article(2)], Some("p3"))
            .with_page(Some("p3"), vec![article(3)], None);
        let (orchestrator, store) = orchestrator(archive);

        let job = orchestrator
            .submit(JobRequest::new("ferry").with_max_pages(2))
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failure_mid_ingestion() {
        let archive = MockArchive::new()
            .with_page(None, vec![article(1)], Some("p2"))
            .fail_on_token("p2");
        let (orchestrator, store) = orchestrator(archive);

        let job = orchestrator
            .submit(JobRequest::new("ferry").with_max_pages(4))
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress_pct, 25);
        assert!(job.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(orchestrator.status(job.id).await.unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (orchestrator, _) = orchestrator(MockArchive::new());
        assert!(matches!(
            orchestrator.status(Uuid::new_v4()).await,
            Err(ResearchError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_terminal() {
        let archive = MockArchive::new().with_page(None, vec![article(1)], None);
        let (orchestrator, _) = orchestrator(archive);

        let handle = orchestrator.submit(JobRequest::new("ferry")).await.unwrap();
        let job = orchestrator
            .wait_for(handle.id(), Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(job.status.is_terminal());
    }
}
