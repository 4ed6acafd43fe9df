//! Archive-search service trait.
//!
//! The archive service is paginated by an opaque continuation token and
//! returns heterogeneous JSON records that the [`crate::archive`] module
//! normalizes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One page request to the archive service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub query: String,
    pub category: String,
    pub page_size: u32,
    pub continuation_token: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<String>,
}

impl ArchiveRequest {
    pub fn new(query: impl Into<String>, category: impl Into<String>, page_size: u32) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            page_size,
            ..Default::default()
        }
    }

    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Same request with the region filter removed.
    pub fn without_region(&self) -> Self {
        Self {
            region: None,
            ..self.clone()
        }
    }
}

/// A raw page of archive records.
#[derive(Debug, Clone, Default)]
pub struct ArchivePage {
    /// Records as returned upstream, in any of the known shapes.
    pub records: Vec<serde_json::Value>,

    /// Token for the next page; `None` when exhausted.
    pub next_token: Option<String>,
}

/// Paginated archive-search service.
#[async_trait]
pub trait ArchiveService: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Fetch one page of results.
    ///
    /// A filter rejected by the upstream service must surface as
    /// [`crate::ResearchError::UpstreamFilterRejected`].
    async fn query(&self, request: &ArchiveRequest) -> Result<ArchivePage>;
}
