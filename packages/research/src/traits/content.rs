//! Page fetching and main-content extraction traits.

use async_trait::async_trait;

use crate::error::Result;

/// Fetches raw page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// Main content pulled out of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub text: String,
}

/// Extracts readable main content from HTML.
///
/// Returns `None` when nothing usable is found.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<ExtractedContent>;
}
