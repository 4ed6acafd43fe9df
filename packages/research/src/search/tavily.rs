//! Tavily-backed web searcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::security::ApiKey;
use crate::traits::searcher::{WebHit, WebSearcher};

const ENDPOINT: &str = "https://api.tavily.com/search";

/// Uses Tavily's search API. Tavily caps `max_results` at 20.
pub struct TavilySearcher {
    api_key: ApiKey,
    client: reqwest::Client,
    search_depth: String,
}

impl TavilySearcher {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            search_depth: "basic".to_string(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// "basic" or "advanced".
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }
}

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
    published_date: Option<String>,
}

impl TavilyResult {
    fn into_hit(self) -> WebHit {
        let mut hit = WebHit::new("tavily", self.url)
            .with_title(self.title.unwrap_or_default())
            .with_snippet(self.content.unwrap_or_default());
        if let Some(date) = self.published_date {
            hit = hit.with_date(date);
        }
        hit
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let request = Request {
            query,
            search_depth: &self.search_depth,
            max_results: max_results.clamp(1, 20),
        };

        let response = self
            .client
            .post(ENDPOINT)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearchError::provider("tavily", e))?;

        if !response.status().is_success() {
            return Err(ResearchError::provider(
                "tavily",
                format!("Tavily API error: {}", response.status()),
            ));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| ResearchError::provider("tavily", e))?;

        Ok(body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .map(TavilyResult::into_hit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_into_hit() {
        let result: TavilyResult = serde_json::from_str(
            r#"{"url": "https://example.org/ferry", "title": "Ferry", "content": "Ashby ferry", "published_date": "2020-01-01"}"#,
        )
        .unwrap();
        let hit = result.into_hit();
        assert_eq!(hit.provider, "tavily");
        assert_eq!(hit.snippet, "Ashby ferry");
        assert_eq!(hit.date.as_deref(), Some("2020-01-01"));
    }
}
