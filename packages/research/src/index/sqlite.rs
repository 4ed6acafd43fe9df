//! SQLite Evidence Index and job store.
//!
//! Evidence lives in one upsert table keyed by record id, with a parallel
//! FTS5 projection of `(id, title, text)` kept in sync inside the same
//! transaction. Jobs live in a separate `jobs` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::fts_match_expression;
use crate::error::{ResearchError, Result};
use crate::traits::store::{EvidenceIndex, IndexHit, JobStore};
use crate::types::evidence::{EvidenceRecord, EvidenceSource};
use crate::types::job::{Job, JobStatus};

/// SQLite-backed [`EvidenceIndex`] and [`JobStore`].
#[derive(Clone)]
pub struct SqliteEvidenceIndex {
    pool: SqlitePool,
}

impl SqliteEvidenceIndex {
    /// Open (creating if missing) the database at `database_url`.
    ///
    /// # Example URLs
    /// - `sqlite://research.db`
    /// - `sqlite::memory:` (prefer [`Self::in_memory`])
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.run_migrations().await?;
        Ok(index)
    }

    /// In-memory database on a single long-lived connection, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.run_migrations().await?;
        Ok(index)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                year INTEGER,
                url TEXT NOT NULL,
                text TEXT NOT NULL DEFAULT '',
                snippets TEXT NOT NULL DEFAULT '[]',
                snippet_chars INTEGER NOT NULL DEFAULT 0,
                dataset TEXT,
                source TEXT NOT NULL,
                published_date TEXT,
                domain TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_dataset ON evidence(dataset);
            CREATE INDEX IF NOT EXISTS idx_evidence_year ON evidence(year);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS evidence_fts USING fts5(
                id UNINDEXED,
                title,
                text
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                year_from INTEGER,
                year_to INTEGER,
                region TEXT,
                max_pages INTEGER NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        record: &EvidenceRecord,
    ) -> Result<()> {
        let snippets = serde_json::to_string(&record.snippets)?;

        sqlx::query(
            r#"
            INSERT INTO evidence (id, title, year, url, text, snippets, snippet_chars, dataset, source, published_date, domain, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                year = COALESCE(excluded.year, evidence.year),
                url = excluded.url,
                text = CASE WHEN length(excluded.text) > length(evidence.text)
                    THEN excluded.text ELSE evidence.text END,
                snippets = CASE WHEN excluded.snippet_chars > evidence.snippet_chars
                    THEN excluded.snippets ELSE evidence.snippets END,
                snippet_chars = MAX(excluded.snippet_chars, evidence.snippet_chars),
                dataset = COALESCE(excluded.dataset, evidence.dataset),
                source = excluded.source,
                published_date = COALESCE(excluded.published_date, evidence.published_date),
                domain = excluded.domain,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(record.year)
        .bind(&record.url)
        .bind(&record.text)
        .bind(&snippets)
        .bind(record.snippet_chars() as i64)
        .bind(&record.dataset)
        .bind(record.source.as_str())
        .bind(&record.published_date)
        .bind(&record.domain)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM evidence_fts WHERE id = ?")
            .bind(&record.id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO evidence_fts (id, title, text) SELECT id, title, text FROM evidence WHERE id = ?",
        )
        .bind(&record.id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct EvidenceRow {
    id: String,
    title: String,
    year: Option<i64>,
    url: String,
    text: String,
    snippets: String,
    dataset: Option<String>,
    source: String,
    published_date: Option<String>,
    domain: String,
}

impl EvidenceRow {
    fn into_record(self) -> Result<EvidenceRecord> {
        let source = EvidenceSource::parse(&self.source).ok_or_else(|| {
            ResearchError::storage(format!("invalid evidence source: {}", self.source))
        })?;
        let snippets: Vec<String> = serde_json::from_str(&self.snippets)
            .map_err(|e| ResearchError::storage(format!("invalid snippets JSON: {e}")))?;

        Ok(EvidenceRecord {
            id: self.id,
            title: self.title,
            url: self.url,
            source,
            year: self.year.and_then(|y| i32::try_from(y).ok()),
            published_date: self.published_date,
            snippets,
            relevance_score: 0.0,
            domain: self.domain,
            rationale: String::new(),
            text: self.text,
            dataset: self.dataset,
        })
    }
}

#[derive(Debug, FromRow)]
struct SearchRow {
    #[sqlx(flatten)]
    record: EvidenceRow,
    score: f64,
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    query: String,
    year_from: Option<i64>,
    year_to: Option<i64>,
    region: Option<String>,
    max_pages: i64,
    status: String,
    progress: i64,
    created_at: String,
    updated_at: String,
    error: Option<String>,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ResearchError::storage(format!("invalid timestamp {value}: {e}")))
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| ResearchError::storage(format!("invalid job id {}: {e}", self.id)))?;
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| ResearchError::storage(format!("invalid job status: {}", self.status)))?;

        Ok(Job {
            id,
            status,
            progress_pct: self.progress.clamp(0, 100) as u8,
            query: self.query,
            year_from: self.year_from.and_then(|y| i32::try_from(y).ok()),
            year_to: self.year_to.and_then(|y| i32::try_from(y).ok()),
            region: self.region,
            max_pages: u32::try_from(self.max_pages).unwrap_or(1),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            error: self.error,
        })
    }
}

const EVIDENCE_COLUMNS: &str =
    "e.id, e.title, e.year, e.url, e.text, e.snippets, e.dataset, e.source, e.published_date, e.domain";

#[async_trait]
impl EvidenceIndex for SqliteEvidenceIndex {
    async fn upsert(&self, record: &EvidenceRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_in(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_batch(&self, records: &[EvidenceRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            Self::upsert_in(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn get(&self, id: &str) -> Result<Option<EvidenceRecord>> {
        let row = sqlx::query_as::<_, EvidenceRow>(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence e WHERE e.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EvidenceRow::into_record).transpose()
    }

    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<IndexHit>> {
        let Some(expression) = fts_match_expression(terms) else {
            return Ok(Vec::new());
        };

        // bm25() is lower-is-better; negate so larger ranks are better.
        let rows = sqlx::query_as::<_, SearchRow>(&format!(
            r#"
            SELECT {EVIDENCE_COLUMNS}, -bm25(evidence_fts) AS score
            FROM evidence_fts
            JOIN evidence e ON e.id = evidence_fts.id
            WHERE evidence_fts MATCH ?
            ORDER BY score DESC
            LIMIT ?
            "#
        ))
        .bind(&expression)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(IndexHit {
                    record: row.record.into_record()?,
                    rank: row.score,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM evidence")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM evidence").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM evidence_fts").execute(&mut *tx).await?;
        tx.commit().await?;
        tracing::info!("Evidence index cleared");
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteEvidenceIndex {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, query, year_from, year_to, region, max_pages, status, progress, created_at, updated_at, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.query)
        .bind(job.year_from)
        .bind(job.year_to)
        .bind(&job.region)
        .bind(i64::from(job.max_pages))
        .bind(job.status.as_str())
        .bind(i64::from(job.progress_pct))
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .bind(&job.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, progress = ?, updated_at = ?, error = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(i64::from(job.progress_pct))
        .bind(job.updated_at.to_rfc3339())
        .bind(&job.error)
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ResearchError::JobNotFound(job.id));
        }
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, query, year_from, year_to, region, max_pages, status, progress, created_at, updated_at, error FROM jobs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, query, year_from, year_to, region, max_pages, status, progress, created_at, updated_at, error FROM jobs ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_index() -> SqliteEvidenceIndex {
        SqliteEvidenceIndex::in_memory().await.unwrap()
    }

    fn record(id: &str, title: &str, text: &str) -> EvidenceRecord {
        EvidenceRecord::new(
            EvidenceSource::Archive,
            id,
            title,
            format!("https://nla.gov.au/nla.news-article{id}"),
        )
        .with_published_date("1912-03-04")
        .with_dataset("newspaper")
        .with_snippet(text)
        .with_text(text)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let index = test_index().await;
        index
            .upsert(&record("1", "Ashby ferry", "The Ashby ferry was busy."))
            .await
            .unwrap();

        let stored = index.get("ARCHIVE:1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Ashby ferry");
        assert_eq!(stored.year, Some(1912));
        assert_eq!(stored.dataset.as_deref(), Some("newspaper"));
        assert_eq!(stored.snippets, vec!["The Ashby ferry was busy."]);
        assert!(index.get("ARCHIVE:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shorter_text_does_not_overwrite() {
        let index = test_index().await;
        let long = record("1", "Ashby ferry", "The Ashby ferry crossed the Clarence River daily.");
        index.upsert(&long).await.unwrap();
        index
            .upsert(&record("1", "Ashby ferry (updated)", "Ferry."))
            .await
            .unwrap();

        let stored = index.get("ARCHIVE:1").await.unwrap().unwrap();
        assert_eq!(stored.text, long.text);
        assert_eq!(stored.snippets, long.snippets);
        assert_eq!(stored.title, "Ashby ferry (updated)");
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_are_raw_and_ordered() {
        let index = test_index().await;
        index
            .upsert_batch(&[
                record("1", "Ashby ferry", "Ashby ferry Ashby ferry at Harwood."),
                record("2", "Council", "The council met about roads."),
                record("3", "Ferry notice", "A ferry notice."),
            ])
            .await
            .unwrap();

        let terms = vec!["ashby".to_string(), "ferry".to_string()];
        let hits = index.search(&terms, 10).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "ARCHIVE:1");
        assert!(hits[0].rank >= hits[1].rank);
        assert!(index.search(&[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_sees_replaced_text() {
        let index = test_index().await;
        index.upsert(&record("1", "Notice", "Short.")).await.unwrap();
        index
            .upsert(&record("1", "Notice", "A much longer notice about the punt."))
            .await
            .unwrap();

        let hits = index.search(&["punt".to_string()], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let index = test_index().await;
        index.upsert(&record("1", "Ferry", "Ferry text.")).await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&["ferry".to_string()], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_round_trip() {
        let index = test_index().await;
        let mut job = Job::new("Ashby ferry", 3)
            .with_years(Some(1900), Some(1925))
            .with_region("New South Wales");
        index.insert_job(&job).await.unwrap();

        job.mark_running().unwrap();
        job.set_progress(1.0 / 3.0);
        index.update_job(&job).await.unwrap();

        let stored = index.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.progress_pct, 33);
        assert_eq!(stored.region.as_deref(), Some("New South Wales"));
        assert_eq!(index.list_jobs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let index = test_index().await;
        let job = Job::new("ferry", 1);
        assert!(matches!(
            index.update_job(&job).await,
            Err(ResearchError::JobNotFound(_))
        ));
    }
}
