//! Brave Search web searcher.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ResearchError, Result};
use crate::security::ApiKey;
use crate::traits::searcher::{WebHit, WebSearcher};

const ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave accepts at most 20 results per request.
const MAX_COUNT: usize = 20;

pub struct BraveSearcher {
    api_key: ApiKey,
    client: reqwest::Client,
}

impl BraveSearcher {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_age: Option<String>,
    #[serde(default)]
    age: Option<String>,
}

fn into_hits(response: Response) -> Vec<WebHit> {
    response
        .web
        .map(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| {
            let mut hit = WebHit::new("brave", r.url)
                .with_title(r.title)
                .with_snippet(r.description);
            if let Some(date) = r.page_age.or(r.age) {
                hit = hit.with_date(date);
            }
            hit
        })
        .collect()
}

#[async_trait]
impl WebSearcher for BraveSearcher {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let count = max_results.clamp(1, MAX_COUNT);
        if max_results > MAX_COUNT {
            tracing::debug!(requested = max_results, capped = MAX_COUNT, "Capping Brave result count");
        }

        let response = self
            .client
            .get(ENDPOINT)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose())
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await
            .map_err(|e| ResearchError::provider("brave", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(ResearchError::provider(
                "brave",
                format!("Brave API error {status}: {excerpt}"),
            ));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| ResearchError::provider("brave", e))?;
        let mut hits = into_hits(body);
        hits.truncate(max_results);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_web_results() {
        let body: Response = serde_json::from_str(
            r#"{"web": {"results": [
                {"title": "Ashby", "url": "https://a.org", "description": "ferry", "page_age": "2021-05-01T00:00:00"},
                {"title": "No url", "url": ""}
            ]}}"#,
        )
        .unwrap();
        let hits = into_hits(body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider, "brave");
        assert_eq!(hits[0].date.as_deref(), Some("2021-05-01T00:00:00"));
    }

    #[test]
    fn test_missing_web_section_is_empty() {
        let body: Response = serde_json::from_str(r#"{"type": "search"}"#).unwrap();
        assert!(into_hits(body).is_empty());
    }
}
