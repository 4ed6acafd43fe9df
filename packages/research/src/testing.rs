//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the research library
//! without making real archive, search, fetch or language-model calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{ResearchError, Result};
use crate::traits::{
    ai::LanguageModel,
    archive::{ArchivePage, ArchiveRequest, ArchiveService},
    content::PageFetcher,
    searcher::{WebHit, WebSearcher},
};

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A mock archive service with pages keyed by continuation token.
///
/// Unknown tokens return an empty page.
#[derive(Default)]
pub struct MockArchive {
    /// Pages by incoming token (`None` is the first page)
    pages: Arc<RwLock<HashMap<Option<String>, ArchivePage>>>,

    /// Reject any request carrying a region
    reject_region: bool,

    /// Fail every request without a region
    reject_all: bool,

    /// Return an empty page whenever a region is set
    empty_with_region: bool,

    /// Fail requests carrying this token
    fail_token: Option<String>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<ArchiveRequest>>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for requests carrying `token`, advertising `next`.
    pub fn with_page(self, token: Option<&str>, records: Vec<serde_json::Value>, next: Option<&str>) -> Self {
        write(&self.pages).insert(
            token.map(str::to_string),
            ArchivePage {
                records,
                next_token: next.map(str::to_string),
            },
        );
        self
    }

    /// Reject region filters with an `UpstreamFilterRejected` (HTTP 400).
    pub fn reject_region(mut self) -> Self {
        self.reject_region = true;
        self
    }

    /// Fail every request that gets past the region check.
    pub fn reject_all(mut self) -> Self {
        self.reject_all = true;
        self
    }

    /// Answer region-filtered requests with zero records.
    pub fn empty_with_region(mut self) -> Self {
        self.empty_with_region = true;
        self
    }

    /// Fail the request for one continuation token.
    pub fn fail_on_token(mut self, token: impl Into<String>) -> Self {
        self.fail_token = Some(token.into());
        self
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<ArchiveRequest> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl ArchiveService for MockArchive {
    fn name(&self) -> &str {
        "mock-archive"
    }

    async fn query(&self, request: &ArchiveRequest) -> Result<ArchivePage> {
        write(&self.calls).push(request.clone());

        if request.region.is_some() {
            if self.reject_region {
                return Err(ResearchError::UpstreamFilterRejected {
                    filter: "region".to_string(),
                    status: 400,
                });
            }
            if self.empty_with_region {
                return Ok(ArchivePage::default());
            }
        }
        if self.reject_all {
            return Err(ResearchError::provider("mock-archive", "service unavailable"));
        }
        if self.fail_token.is_some() && request.continuation_token == self.fail_token {
            return Err(ResearchError::provider("mock-archive", "connection reset"));
        }

        Ok(read(&self.pages)
            .get(&request.continuation_token)
            .cloned()
            .unwrap_or_default())
    }
}

/// A mock web searcher with hits per query and a default.
#[derive(Default)]
pub struct MockWebSearcher {
    name: String,
    hits: Arc<RwLock<HashMap<String, Vec<WebHit>>>>,
    default_hits: Vec<WebHit>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockWebSearcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Hits returned for queries without a specific entry.
    pub fn with_default(mut self, hits: Vec<WebHit>) -> Self {
        self.default_hits = hits;
        self
    }

    /// Hits returned for one query.
    pub fn with_hits(self, query: impl Into<String>, hits: Vec<WebHit>) -> Self {
        write(&self.hits).insert(query.into(), hits);
        self
    }

    pub fn calls(&self) -> usize {
        read(&self.calls).len()
    }

    pub fn queries(&self) -> Vec<String> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl WebSearcher for MockWebSearcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        write(&self.calls).push(query.to_string());
        let hits = read(&self.hits)
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_hits.clone());
        Ok(hits.into_iter().take(max_results).collect())
    }
}

/// A web searcher that always fails, simulating an outage.
#[derive(Default)]
pub struct FailingWebSearcher {
    name: String,
    calls: Arc<RwLock<usize>>,
}

impl FailingWebSearcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        *read(&self.calls)
    }
}

#[async_trait]
impl WebSearcher for FailingWebSearcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebHit>> {
        *write(&self.calls) += 1;
        Err(ResearchError::provider(&self.name, "simulated outage"))
    }
}

/// A mock language model answering from a queue of canned responses.
///
/// Once the queue is empty the fallback response is used, or an error when
/// none is set.
#[derive(Default)]
pub struct MockLanguageModel {
    responses: Arc<RwLock<VecDeque<std::result::Result<String, String>>>>,
    fallback: Option<String>,

    /// User prompts received, in order
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn with_response(self, raw: impl Into<String>) -> Self {
        write(&self.responses).push_back(Ok(raw.into()));
        self
    }

    /// Queue a provider failure.
    pub fn with_error(self, reason: impl Into<String>) -> Self {
        write(&self.responses).push_back(Err(reason.into()));
        self
    }

    /// Response used after the queue runs dry.
    pub fn with_fallback(mut self, raw: impl Into<String>) -> Self {
        self.fallback = Some(raw.into());
        self
    }

    pub fn calls(&self) -> usize {
        read(&self.prompts).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        read(&self.prompts).clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        "mock-model"
    }

    async fn generate_structured(
        &self,
        _system: &str,
        user: &str,
        _schema: serde_json::Value,
    ) -> Result<String> {
        write(&self.prompts).push(user.to_string());

        let next = write(&self.responses).pop_front();
        match next {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(ResearchError::provider("mock-model", reason)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ResearchError::provider("mock-model", "no response queued")),
        }
    }
}

/// A mock page fetcher serving canned HTML by URL.
///
/// URLs without a page fail like an HTTP 404. An optional delay keeps
/// fetches in flight long enough to observe concurrency.
#[derive(Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    fetched: Arc<RwLock<Vec<String>>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        write(&self.pages).insert(url.into(), html.into());
        self
    }

    /// Hold every fetch for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every URL a fetch was attempted for.
    pub fn fetched(&self) -> Vec<String> {
        read(&self.fetched).clone()
    }

    /// Most fetches that were ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        write(&self.fetched).push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        read(&self.pages)
            .get(url)
            .cloned()
            .ok_or_else(|| ResearchError::Http(format!("HTTP 404 Not Found for {url}").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_archive_pages_by_token() {
        let archive = MockArchive::new()
            .with_page(None, vec![serde_json::json!({"id": "1"})], Some("p2"));

        let first = archive
            .query(&ArchiveRequest::new("ferry", "newspaper", 20))
            .await
            .unwrap();
        assert_eq!(first.next_token.as_deref(), Some("p2"));

        let unknown = archive
            .query(&ArchiveRequest::new("ferry", "newspaper", 20).with_token(Some("zzz".into())))
            .await
            .unwrap();
        assert!(unknown.records.is_empty());
        assert_eq!(archive.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_model_queue_then_fallback() {
        let model = MockLanguageModel::new().with_response("a").with_fallback("b");
        let schema = serde_json::json!({});
        assert_eq!(model.generate_structured("s", "u", schema.clone()).await.unwrap(), "a");
        assert_eq!(model.generate_structured("s", "u", schema).await.unwrap(), "b");
        assert_eq!(model.calls(), 2);
    }
}
