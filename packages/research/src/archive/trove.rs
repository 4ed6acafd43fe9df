//! Trove v3 archive-search adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ResearchError, Result};
use crate::security::ApiKey;
use crate::traits::archive::{ArchivePage, ArchiveRequest, ArchiveService};

const DEFAULT_ENDPOINT: &str = "https://api.trove.nla.gov.au/v3/result";

/// Trove-backed [`ArchiveService`].
pub struct TroveArchive {
    api_key: ApiKey,
    client: reqwest::Client,
    endpoint: String,
}

impl TroveArchive {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Query parameters for one page request.
    pub fn query_params(request: &ArchiveRequest) -> Vec<(&'static str, String)> {
        let mut q = request.query.trim().to_string();
        if let Some(clause) = date_clause(request.year_from, request.year_to) {
            q = if q.is_empty() { clause } else { format!("{q} {clause}") };
        }

        let mut params = vec![
            ("q", q),
            ("category", request.category.clone()),
            ("n", request.page_size.to_string()),
            ("s", request.continuation_token.clone().unwrap_or_else(|| "*".to_string())),
            ("encoding", "json".to_string()),
            ("bulkHarvest", "true".to_string()),
            ("reclevel", "full".to_string()),
        ];
        if let Some(region) = request.region.as_deref().filter(|r| !r.trim().is_empty()) {
            params.push(("l-state", region.to_string()));
        }
        params
    }
}

/// `date:[FROM TO]` clause covering whole years.
fn date_clause(year_from: Option<i32>, year_to: Option<i32>) -> Option<String> {
    let (from, to) = match (year_from, year_to) {
        (None, None) => return None,
        (Some(from), Some(to)) => (from.min(to), from.max(to)),
        (Some(from), None) => (from, from),
        (None, Some(to)) => (to, to),
    };
    Some(format!(
        "date:[{from}-01-01T00:00:00Z TO {to}-12-31T23:59:59Z]"
    ))
}

#[derive(Debug, Default, Deserialize)]
struct TroveResponse {
    #[serde(default)]
    category: Vec<TroveCategory>,
}

#[derive(Debug, Default, Deserialize)]
struct TroveCategory {
    #[serde(default)]
    records: TroveRecords,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TroveRecords {
    #[serde(default)]
    next_start: Option<String>,
    #[serde(default)]
    article: Vec<Value>,
    #[serde(default)]
    work: Vec<Value>,
}

/// Flatten every category's records into one page.
fn into_page(response: TroveResponse) -> ArchivePage {
    let mut page = ArchivePage::default();
    for category in response.category {
        let records = category.records;
        if page.next_token.is_none() {
            page.next_token = records.next_start.filter(|s| !s.is_empty());
        }
        page.records.extend(records.article);
        page.records.extend(records.work);
    }
    page
}

#[async_trait]
impl ArchiveService for TroveArchive {
    fn name(&self) -> &str {
        "trove"
    }

    async fn query(&self, request: &ArchiveRequest) -> Result<ArchivePage> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose())
            .query(&Self::query_params(request))
            .send()
            .await
            .map_err(|e| ResearchError::provider("trove", e))?;

        let status = response.status();
        if request.region.is_some()
            && matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY)
        {
            return Err(ResearchError::UpstreamFilterRejected {
                filter: "region".to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ResearchError::provider(
                "trove",
                format!("Trove API error: {status}"),
            ));
        }

        let body: TroveResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::provider("trove", e))?;
        Ok(into_page(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_params_include_filters() {
        let request = ArchiveRequest::new("Ashby ferry", "newspaper", 20)
            .with_years(Some(1925), Some(1900))
            .with_region(Some("New South Wales".to_string()))
            .with_token(Some("AoE".to_string()));

        let params = TroveArchive::query_params(&request);
        let get = |k: &str| params.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());

        assert_eq!(
            get("q"),
            Some("Ashby ferry date:[1900-01-01T00:00:00Z TO 1925-12-31T23:59:59Z]")
        );
        assert_eq!(get("s"), Some("AoE"));
        assert_eq!(get("n"), Some("20"));
        assert_eq!(get("l-state"), Some("New South Wales"));
    }

    #[test]
    fn test_first_page_uses_star_cursor() {
        let request = ArchiveRequest::new("ferry", "newspaper", 20);
        let params = TroveArchive::query_params(&request);
        assert!(params.contains(&("s", "*".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "l-state"));
    }

    #[test]
    fn test_response_flattens_categories() {
        let body: TroveResponse = serde_json::from_value(json!({
            "category": [{
                "code": "newspaper",
                "records": {
                    "nextStart": "AoE2",
                    "article": [{"id": "1"}, {"id": "2"}]
                }
            }, {
                "code": "book",
                "records": {"work": [{"id": "3"}]}
            }]
        }))
        .unwrap();

        let page = into_page(body);
        assert_eq!(page.records.len(), 3);
        assert_eq!(page.next_token.as_deref(), Some("AoE2"));
    }
}
