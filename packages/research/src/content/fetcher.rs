//! HTTP page fetcher.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{ResearchError, Result};
use crate::traits::content::PageFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; research-bot/0.1; +https://github.com/)";

/// Fetches raw HTML with reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::Http(
                format!("HTTP {status} for {url}").into(),
            ));
        }

        Ok(response.text().await?)
    }
}
