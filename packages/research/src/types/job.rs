//! Batch ingestion job model and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ResearchError, Result};

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// `done` and `error` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Legal transitions: queued -> running -> done, running -> error.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job Model
// ============================================================================

/// A batch archive ingestion job.
///
/// Mutated only by the task that owns it; other callers read snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress_pct: u8,
    pub query: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<String>,
    pub max_pages: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Job {
    /// Create a queued job.
    pub fn new(query: impl Into<String>, max_pages: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress_pct: 0,
            query: query.into(),
            year_from: None,
            year_to: None,
            region: None,
            max_pages: max_pages.max(1),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ResearchError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// queued -> running
    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(JobStatus::Running)
    }

    /// Record progress as a fraction; capped below 100 until [`Job::mark_done`].
    pub fn set_progress(&mut self, fraction: f64) {
        let capped = fraction.clamp(0.0, 0.99);
        self.progress_pct = (capped * 100.0).floor() as u8;
        self.updated_at = Utc::now();
    }

    /// running -> done
    pub fn mark_done(&mut self) -> Result<()> {
        self.transition(JobStatus::Done)?;
        self.progress_pct = 100;
        Ok(())
    }

    /// running -> error
    pub fn mark_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Error)?;
        let message = message.into();
        self.error = Some(if message.is_empty() {
            "unknown ingestion error".to_string()
        } else {
            message
        });
        Ok(())
    }
}
