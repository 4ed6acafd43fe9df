//! Evidence types - normalized search hits from the archive and the web.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::quotes::ELLIPSIS;

/// Maximum characters kept per snippet.
pub const MAX_SNIPPET_CHARS: usize = 240;

/// Which provider family produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Archive,
    Web,
}

impl EvidenceSource {
    /// Prefix used for provider-scoped record ids.
    pub fn prefix(&self) -> &'static str {
        match self {
            EvidenceSource::Archive => "ARCHIVE",
            EvidenceSource::Web => "WEB",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSource::Archive => "archive",
            EvidenceSource::Web => "web",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "archive" => Some(EvidenceSource::Archive),
            "web" => Some(EvidenceSource::Web),
            _ => None,
        }
    }
}

/// A single normalized search hit with score and quotes.
///
/// Identity is the provider-prefixed `id`. Records from different providers
/// are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// Provider-prefixed id (`ARCHIVE:<id>` or `WEB:<url>`)
    pub id: String,

    pub title: String,

    pub url: String,

    pub source: EvidenceSource,

    /// Publication year if known
    pub year: Option<i32>,

    /// Raw publication date as reported upstream
    pub published_date: Option<String>,

    /// Verbatim quotes, each at most 240 characters
    #[serde(default)]
    pub snippets: Vec<String>,

    /// Normalized relevance in [0, 1]
    #[serde(default)]
    pub relevance_score: f64,

    #[serde(default)]
    pub domain: String,

    /// Why this record ranked where it did
    #[serde(default)]
    pub rationale: String,

    /// Full supporting text (snippet or extracted page text)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    /// Dataset tag for persisted records (e.g. the archive category)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

impl EvidenceRecord {
    /// Create a record with a provider-prefixed id.
    pub fn new(
        source: EvidenceSource,
        native_id: impl AsRef<str>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: format!("{}:{}", source.prefix(), native_id.as_ref()),
            title: title.into(),
            domain: domain_of(&url),
            url,
            source,
            year: None,
            published_date: None,
            snippets: Vec::new(),
            relevance_score: 0.0,
            rationale: String::new(),
            text: String::new(),
            dataset: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_published_date(mut self, date: impl Into<String>) -> Self {
        let date = date.into();
        if self.year.is_none() {
            self.year = year_from_date(&date);
        }
        self.published_date = Some(date);
        self
    }

    /// Add a snippet, capped at [`MAX_SNIPPET_CHARS`].
    pub fn with_snippet(mut self, snippet: impl AsRef<str>) -> Self {
        self.snippets.push(cap_snippet(snippet.as_ref()));
        self
    }

    /// Total characters across all snippets.
    pub fn snippet_chars(&self) -> usize {
        self.snippets.iter().map(|s| s.chars().count()).sum()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Title, snippets and text joined for lexical scoring.
    pub fn scoring_text(&self) -> String {
        let mut blob = self.title.clone();
        for snippet in &self.snippets {
            blob.push(' ');
            blob.push_str(snippet);
        }
        if !self.text.is_empty() {
            blob.push(' ');
            blob.push_str(&self.text);
        }
        blob
    }
}

/// Where a search plan step should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanScope {
    Web,
    Archive,
}

/// One query in a deep-research search plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlanStep {
    pub query: String,
    pub rationale: String,
    pub scope: PlanScope,
}

/// Retrieval statistics reported alongside evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalStats {
    pub retrieved: usize,
    pub dropped_off_topic: usize,
    pub used: usize,
}

/// Lowercased host without a leading `www.`.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

/// Case-folded URL with the trailing slash stripped, used for dedupe.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

/// First four-digit run in 1000..=2999 found in a date string.
pub fn year_from_date(date: &str) -> Option<i32> {
    let bytes = date.as_bytes();
    let mut start = 0;
    while start + 4 <= bytes.len() {
        let digits = bytes[start..start + 4].iter().all(|b| b.is_ascii_digit());
        let bounded_left = start == 0 || !bytes[start - 1].is_ascii_digit();
        let bounded_right = start + 4 == bytes.len() || !bytes[start + 4].is_ascii_digit();
        if digits && bounded_left && bounded_right {
            if let Ok(year) = date[start..start + 4].parse::<i32>() {
                if (1000..=2999).contains(&year) {
                    return Some(year);
                }
            }
        }
        start += 1;
    }
    None
}

/// Trim and cap at [`MAX_SNIPPET_CHARS`], ending a cut snippet with the
/// ellipsis marker.
pub fn cap_snippet(snippet: &str) -> String {
    let snippet = snippet.trim();
    if snippet.chars().count() <= MAX_SNIPPET_CHARS {
        return snippet.to_string();
    }
    let mut cut: String = snippet.chars().take(MAX_SNIPPET_CHARS - 1).collect();
    cut = cut.trim_end().trim_end_matches(ELLIPSIS).to_string();
    cut.push(ELLIPSIS);
    cut
}

/// Drop later records repeating an earlier record of the same source by
/// normalized URL, or by title on the same domain and date.
///
/// Records from different sources never collide.
pub fn dedupe_records(records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let url = normalize_url(&r.url);
            let url_new = url.is_empty() || seen_urls.insert((r.source, url));
            let title = r.title.trim().to_lowercase();
            let title_new = title.is_empty()
                || seen_titles.insert((r.source, r.domain.clone(), title, r.published_date.clone()));
            url_new && title_new
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_provider_prefixed() {
        let archive = EvidenceRecord::new(EvidenceSource::Archive, "12345", "Ferry", "https://trove.nla.gov.au/newspaper/article/12345");
        let web = EvidenceRecord::new(EvidenceSource::Web, "https://example.com/a", "A", "https://example.com/a");

        assert_eq!(archive.id, "ARCHIVE:12345");
        assert_eq!(web.id, "WEB:https://example.com/a");
        assert_eq!(archive.domain, "trove.nla.gov.au");
    }

    #[test]
    fn test_snippets_are_capped() {
        let record = EvidenceRecord::new(EvidenceSource::Web, "x", "X", "https://x.org")
            .with_snippet("a".repeat(500));
        assert_eq!(record.snippets[0].chars().count(), MAX_SNIPPET_CHARS);
        assert!(record.snippets[0].ends_with(ELLIPSIS));

        let exact = EvidenceRecord::new(EvidenceSource::Web, "x", "X", "https://x.org")
            .with_snippet("b".repeat(MAX_SNIPPET_CHARS));
        assert_eq!(exact.snippets[0], "b".repeat(MAX_SNIPPET_CHARS));
    }

    #[test]
    fn test_dedupe_by_url_and_title() {
        let archive = |id: &str, title: &str, url: &str, date: &str| {
            EvidenceRecord::new(EvidenceSource::Archive, id, title, url).with_published_date(date)
        };
        let records = vec![
            archive("1", "Ashby Ferry", "https://nla.gov.au/x", "1912-01-01"),
            archive("2", "Harwood punt", "https://nla.gov.au/X/", "1913-01-01"),
            archive("3", "ashby ferry ", "https://nla.gov.au/y", "1912-01-01"),
            archive("4", "Ashby Ferry", "https://nla.gov.au/z", "1920-06-01"),
            EvidenceRecord::new(EvidenceSource::Web, "https://nla.gov.au/x", "Ashby Ferry", "https://nla.gov.au/x"),
        ];

        let ids: Vec<String> = dedupe_records(records).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["ARCHIVE:1", "ARCHIVE:4", "WEB:https://nla.gov.au/x"]);
    }

    #[test]
    fn test_year_from_date() {
        assert_eq!(year_from_date("1912-03-04"), Some(1912));
        assert_eq!(year_from_date("4 March 1912"), Some(1912));
        assert_eq!(year_from_date("no date"), None);
        assert_eq!(year_from_date("123456"), None);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://Example.com/Page/"), "https://example.com/page");
        assert_eq!(domain_of("https://www.Example.com/x"), "example.com");
    }
}
