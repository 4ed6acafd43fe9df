//! Web searcher trait for multi-provider evidence discovery.
//!
//! Providers are interchangeable: the aggregator queries every configured
//! provider through this one interface regardless of vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A raw hit from a web-search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,

    /// Publication date if the provider reports one
    pub date: Option<String>,

    /// Name of the provider that returned this hit
    pub provider: String,
}

impl WebHit {
    pub fn new(provider: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            url: url.into(),
            snippet: String::new(),
            date: None,
            provider: provider.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Web search provider.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Provider name for logs and attribution.
    fn name(&self) -> &str;

    /// Search the web, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;
}

/// A synchronous provider, run on the blocking worker pool.
///
/// See [`crate::search::BlockingSearcher`].
pub trait SyncWebSearcher: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn search_blocking(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;
}
