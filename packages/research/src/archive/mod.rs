//! Archive query client.
//!
//! Issues paginated, filtered queries to the archive-search service and
//! normalizes whatever record shapes come back into evidence records.
//!
//! A region filter the upstream service rejects, or that empties the first
//! page, is dropped and the query retried exactly once.

pub mod normalize;
pub mod trove;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ResearchError, Result};
use crate::traits::archive::{ArchivePage, ArchiveRequest, ArchiveService};
use crate::types::{config::IngestConfig, evidence::EvidenceRecord};

pub use normalize::{normalize, NormalizedRecord};
pub use trove::TroveArchive;

/// One page of normalized archive evidence.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSearch {
    pub records: Vec<EvidenceRecord>,

    /// Opaque continuation token for the next page
    pub next_page_token: Option<String>,

    /// Whether the region filter was dropped to get these results
    pub region_dropped: bool,
}

/// Parameters for one archive search.
#[derive(Debug, Clone, Default)]
pub struct ArchiveQuery<'a> {
    pub query: &'a str,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<&'a str>,
    pub page_token: Option<&'a str>,
}

impl<'a> ArchiveQuery<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    pub fn years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }

    pub fn region(mut self, region: Option<&'a str>) -> Self {
        self.region = region;
        self
    }

    pub fn page_token(mut self, token: Option<&'a str>) -> Self {
        self.page_token = token;
        self
    }
}

/// Client over an [`ArchiveService`].
#[derive(Clone)]
pub struct ArchiveClient {
    service: Arc<dyn ArchiveService>,
    config: IngestConfig,
}

impl ArchiveClient {
    pub fn new(service: Arc<dyn ArchiveService>) -> Self {
        Self {
            service,
            config: IngestConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Search one page, retrying once without the region filter when the
    /// upstream rejects it or it empties the first page.
    pub async fn search(&self, query: ArchiveQuery<'_>) -> Result<ArchiveSearch> {
        let request = ArchiveRequest::new(query.query, &self.config.category, self.config.page_size)
            .with_years(query.year_from, query.year_to)
            .with_region(query.region.map(str::to_string))
            .with_token(query.page_token.map(str::to_string));

        let first = self.service.query(&request).await;
        let (page, region_dropped) = match first {
            Err(ResearchError::UpstreamFilterRejected { filter, status }) if request.region.is_some() => {
                warn!(
                    provider = %self.service.name(),
                    query = %request.query,
                    filter = %filter,
                    status,
                    "Archive rejected filter, retrying without region"
                );
                (self.service.query(&request.without_region()).await?, true)
            }
            Ok(page)
                if page.records.is_empty()
                    && request.region.is_some()
                    && request.continuation_token.is_none() =>
            {
                info!(
                    provider = %self.service.name(),
                    query = %request.query,
                    region = ?request.region,
                    "No archive results with region filter, retrying without it"
                );
                (self.service.query(&request.without_region()).await?, true)
            }
            other => (other?, false),
        };

        Ok(self.normalize_page(page, region_dropped))
    }

    fn normalize_page(&self, page: ArchivePage, region_dropped: bool) -> ArchiveSearch {
        let total = page.records.len();
        let records: Vec<EvidenceRecord> = page
            .records
            .iter()
            .filter_map(|raw| normalize(raw).into_evidence(&self.config.category))
            .collect();

        if records.len() < total {
            debug!(
                skipped = total - records.len(),
                "Skipped archive records without id or url"
            );
        }

        ArchiveSearch {
            records,
            next_page_token: page.next_token.filter(|t| !t.is_empty()),
            region_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockArchive;
    use serde_json::json;

    fn article(id: &str, heading: &str) -> serde_json::Value {
        json!({"id": id, "heading": heading, "date": "1912-01-01", "troveUrl": format!("https://nla.gov.au/{id}")})
    }

    #[tokio::test]
    async fn test_retries_without_rejected_region() {
        let archive = Arc::new(
            MockArchive::new()
                .reject_region()
                .with_page(None, vec![article("1", "Ferry")], None),
        );
        let client = ArchiveClient::new(archive.clone());

        let result = client
            .search(ArchiveQuery::new("ferry").region(Some("New South Wales")))
            .await
            .unwrap();

        assert!(result.region_dropped);
        assert_eq!(result.records.len(), 1);
        let calls = archive.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].region.is_some());
        assert!(calls[1].region.is_none());
    }

    #[tokio::test]
    async fn test_retry_happens_once() {
        let archive = Arc::new(MockArchive::new().reject_region().reject_all());
        let client = ArchiveClient::new(archive.clone());

        let result = client
            .search(ArchiveQuery::new("ferry").region(Some("NSW")))
            .await;

        assert!(result.is_err());
        assert_eq!(archive.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_without_region() {
        let archive = Arc::new(MockArchive::new());
        let client = ArchiveClient::new(archive.clone());

        let result = client.search(ArchiveQuery::new("ferry")).await.unwrap();

        assert!(result.records.is_empty());
        assert!(!result.region_dropped);
        assert_eq!(archive.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_passes_continuation_token() {
        let archive = Arc::new(
            MockArchive::new()
                .with_page(None, vec![article("1", "A")], Some("next-1"))
                .with_page(Some("next-1"), vec![article("2", "B")], None),
        );
        let client = ArchiveClient::new(archive.clone());

        let first = client.search(ArchiveQuery::new("ferry")).await.unwrap();
        assert_eq!(first.next_page_token.as_deref(), Some("next-1"));

        let second = client
            .search(ArchiveQuery::new("ferry").page_token(first.next_page_token.as_deref()))
            .await
            .unwrap();
        assert_eq!(second.records[0].id, "ARCHIVE:2");
        assert!(second.next_page_token.is_none());
    }
}
