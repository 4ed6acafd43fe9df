//! Multi-provider web search aggregation.
//!
//! Providers are queried in fixed priority order under a shared wall-clock
//! budget. Each provider call is its own error boundary: a failing provider
//! is logged and skipped, never propagated. Candidates are deduplicated by
//! normalized URL before any page is fetched, then the top few are fetched
//! concurrently for main-content text, quoted, scored and ranked.
//!
//! # Example
//!
//! ```rust,ignore
//! let aggregator = WebSearchAggregator::new(vec![tavily, brave])
//!     .with_fetcher(Arc::new(HttpFetcher::new()))
//!     .with_cache(cache);
//!
//! let results = aggregator
//!     .search_web("Ashby ferry Harwood", WebSearchOptions::default())
//!     .await;
//! ```

pub mod blocking;
pub mod brave;
pub mod tavily;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::content::TwoStageExtractor;
use crate::quotes::{best_sentences, query_terms, truncate_with_ellipsis, DEFAULT_MAX_LEN};
use crate::scoring::{ScoreInput, Scorer, ScoringContext};
use crate::traits::content::{ContentExtractor, ExtractedContent, PageFetcher};
use crate::traits::searcher::{WebHit, WebSearcher};
use crate::types::config::SearchConfig;
use crate::types::evidence::{
    domain_of, normalize_url, year_from_date, EvidenceRecord, EvidenceSource,
};

pub use blocking::{BlockingSearcher, WorkerPool};
pub use brave::BraveSearcher;
pub use tavily::TavilySearcher;

/// Cache of raw provider hits, keyed by provider, query and limit.
pub type HitCache = TtlCache<String, Vec<WebHit>>;

/// Per-call options for [`WebSearchAggregator::search_web`].
#[derive(Debug, Clone)]
pub struct WebSearchOptions {
    pub max_results: usize,
    pub time_budget: Duration,
    pub prefer_recent: bool,
    pub fetch_content: bool,

    /// Requested year window for date proximity
    pub year_range: Option<(i32, i32)>,
}

impl Default for WebSearchOptions {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl WebSearchOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            time_budget: config.time_budget,
            prefer_recent: false,
            fetch_content: true,
            year_range: None,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_prefer_recent(mut self, prefer_recent: bool) -> Self {
        self.prefer_recent = prefer_recent;
        self
    }

    pub fn with_fetch_content(mut self, fetch: bool) -> Self {
        self.fetch_content = fetch;
        self
    }

    pub fn with_year_range(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_range = match (year_from, year_to) {
            (Some(from), Some(to)) => Some((from.min(to), from.max(to))),
            (Some(y), None) | (None, Some(y)) => Some((y, y)),
            (None, None) => None,
        };
        self
    }
}

/// Wall-clock budget shared by every provider attempt in one call.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    total: Duration,
    cutoff: f64,
}

impl Budget {
    pub fn start(total: Duration, cutoff: f64) -> Self {
        Self {
            started: Instant::now(),
            total,
            cutoff: cutoff.clamp(0.0, 1.0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed())
    }

    /// New providers may start until the cutoff fraction has elapsed.
    pub fn providers_open(&self) -> bool {
        self.elapsed() < self.total.mul_f64(self.cutoff)
    }
}

/// A ranked web result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published_date: Option<String>,
    pub provider: String,

    /// Main-content text when the page was fetched and extracted
    pub extracted_text: Option<String>,

    pub quotes: Vec<String>,
    pub score: f64,
    pub domain: String,
    pub rationale: String,
}

impl WebSearchResult {
    fn from_hit(hit: WebHit, extracted: Option<ExtractedContent>) -> Self {
        let title = match (&extracted, hit.title.trim().is_empty()) {
            (Some(ExtractedContent { title: Some(t), .. }), true) => t.clone(),
            _ => hit.title,
        };
        Self {
            title,
            domain: domain_of(&hit.url),
            url: hit.url,
            snippet: hit.snippet,
            published_date: hit.date,
            provider: hit.provider,
            extracted_text: extracted.map(|e| e.text),
            quotes: Vec::new(),
            score: 0.0,
            rationale: String::new(),
        }
    }

    /// Text used for quotes: extracted page text, else the provider snippet.
    fn body(&self) -> &str {
        self.extracted_text.as_deref().unwrap_or(&self.snippet)
    }

    pub fn into_evidence(self) -> EvidenceRecord {
        let url = self.url;
        let mut record = EvidenceRecord::new(EvidenceSource::Web, url.clone(), self.title, url);
        if let Some(date) = self.published_date {
            record = record.with_published_date(date);
        }
        for quote in &self.quotes {
            record = record.with_snippet(quote);
        }
        record.text = self.extracted_text.unwrap_or(self.snippet);
        record.relevance_score = self.score;
        record.rationale = self.rationale;
        record
    }
}

/// Queries every configured provider and ranks the merged results.
pub struct WebSearchAggregator {
    providers: Vec<Arc<dyn WebSearcher>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    extractor: Arc<dyn ContentExtractor>,
    scorer: Scorer,
    cache: Option<Arc<HitCache>>,
    config: SearchConfig,
}

impl WebSearchAggregator {
    /// Providers are tried in the order given.
    pub fn new(providers: Vec<Arc<dyn WebSearcher>>) -> Self {
        Self {
            providers,
            fetcher: None,
            extractor: Arc::new(TwoStageExtractor::default()),
            scorer: Scorer::default(),
            cache: None,
            config: SearchConfig::default(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_cache(mut self, cache: Arc<HitCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Search all providers and return up to `max_results` ranked results.
    ///
    /// Never fails: with every provider down the result is simply empty.
    pub async fn search_web(&self, query: &str, options: WebSearchOptions) -> Vec<WebSearchResult> {
        let budget = Budget::start(options.time_budget, self.config.provider_cutoff);
        let target = options.max_results.max(1) * self.config.candidate_multiplier.max(1);

        let candidates = self.collect(query, target, &budget).await;
        if candidates.is_empty() {
            info!(query = %query, "No web candidates from any provider");
            return Vec::new();
        }

        let mut extracted = if options.fetch_content {
            self.fetch_top(&candidates).await
        } else {
            HashMap::new()
        };

        let mut results: Vec<WebSearchResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, hit)| WebSearchResult::from_hit(hit, extracted.remove(&i).flatten()))
            .collect();

        let terms = query_terms(query);
        self.attach_quotes(&mut results, &terms);
        self.score(&mut results, terms, &options);

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut results = dedupe_ranked(results);
        results.truncate(options.max_results);

        debug!(
            query = %query,
            results = results.len(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Web search complete"
        );
        results
    }

    /// Walk providers in order until the candidate target or the cutoff.
    async fn collect(&self, query: &str, target: usize, budget: &Budget) -> Vec<WebHit> {
        let mut candidates: IndexMap<String, WebHit> = IndexMap::new();

        for provider in &self.providers {
            if candidates.len() >= target {
                break;
            }
            if !budget.providers_open() {
                info!(
                    provider = %provider.name(),
                    elapsed_ms = budget.elapsed().as_millis() as u64,
                    "Search budget cutoff reached, not starting provider"
                );
                break;
            }

            for hit in self.call_provider(provider, query, target, budget).await {
                if hit.url.trim().is_empty() {
                    continue;
                }
                candidates.entry(normalize_url(&hit.url)).or_insert(hit);
            }
        }

        candidates.into_values().collect()
    }

    async fn call_provider(
        &self,
        provider: &Arc<dyn WebSearcher>,
        query: &str,
        max_results: usize,
        budget: &Budget,
    ) -> Vec<WebHit> {
        let timeout = self.config.provider_timeout.min(budget.remaining());
        let attempt = async {
            match &self.cache {
                Some(cache) => cache
                    .get_or_try_insert_with(
                        cache_key(provider.name(), query, max_results),
                        |hits: &Vec<WebHit>| !hits.is_empty(),
                        || provider.search(query, max_results),
                    )
                    .await
                    .map(|hits| hits.as_ref().clone()),
                None => provider.search(query, max_results).await,
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(hits)) => {
                debug!(provider = %provider.name(), hits = hits.len(), "Provider returned hits");
                hits
            }
            Ok(Err(e)) => {
                warn!(provider = %provider.name(), query = %query, error = %e, "Web search provider failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    provider = %provider.name(),
                    query = %query,
                    timeout_ms = timeout.as_millis() as u64,
                    "Web search provider timed out"
                );
                Vec::new()
            }
        }
    }

    /// Fetch and extract the top candidates, at most `fetch_concurrency` at once.
    async fn fetch_top(&self, candidates: &[WebHit]) -> HashMap<usize, Option<ExtractedContent>> {
        let Some(fetcher) = &self.fetcher else {
            return HashMap::new();
        };

        let fetches = candidates
            .iter()
            .take(self.config.fetch_top_n)
            .enumerate()
            .map(|(i, hit)| {
                let fetcher = Arc::clone(fetcher);
                let url = hit.url.clone();
                async move { (i, self.fetch_one(fetcher.as_ref(), &url).await) }
            });

        stream::iter(fetches)
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect()
            .await
    }

    async fn fetch_one(&self, fetcher: &dyn PageFetcher, url: &str) -> Option<ExtractedContent> {
        match tokio::time::timeout(self.config.fetch_timeout, fetcher.fetch_html(url)).await {
            Ok(Ok(html)) => {
                let content = self.extractor.extract(&html);
                if content.is_none() {
                    debug!(url = %url, "No main content extracted, using snippet");
                }
                content
            }
            Ok(Err(e)) => {
                debug!(url = %url, error = %e, "Page fetch failed, using snippet");
                None
            }
            Err(_) => {
                debug!(url = %url, "Page fetch timed out, using snippet");
                None
            }
        }
    }

    fn attach_quotes(&self, results: &mut [WebSearchResult], terms: &[String]) {
        let k = self.config.quotes_per_result;
        for result in results.iter_mut() {
            let mut quotes = best_sentences(result.body(), terms, k, DEFAULT_MAX_LEN);
            if quotes.is_empty() {
                let fallback = if result.snippet.trim().is_empty() {
                    result.body()
                } else {
                    result.snippet.as_str()
                };
                let fallback = truncate_with_ellipsis(fallback.trim(), DEFAULT_MAX_LEN);
                if !fallback.is_empty() {
                    quotes.push(fallback);
                }
            }
            result.quotes = quotes;
        }
    }

    fn score(&self, results: &mut [WebSearchResult], terms: Vec<String>, options: &WebSearchOptions) {
        let blobs: Vec<String> = results
            .iter()
            .map(|r| {
                let mut blob = format!("{} {}", r.title, r.snippet);
                if let Some(text) = &r.extracted_text {
                    blob.push(' ');
                    blob.push_str(text);
                }
                blob
            })
            .collect();
        let years: Vec<Option<i32>> = results
            .iter()
            .map(|r| r.published_date.as_deref().and_then(year_from_date))
            .collect();
        let inputs: Vec<ScoreInput<'_>> = results
            .iter()
            .zip(&blobs)
            .zip(&years)
            .map(|((r, blob), year)| ScoreInput {
                title: &r.title,
                text: blob,
                year: *year,
                published: r.published_date.as_deref(),
                domain: &r.domain,
            })
            .collect();

        let (from, to) = options.year_range.unzip();
        let ctx = ScoringContext::new(terms)
            .with_year_range(from, to)
            .with_prefer_recent(options.prefer_recent);
        let breakdowns = self.scorer.score_batch(&inputs, &ctx);

        for (result, breakdown) in results.iter_mut().zip(breakdowns) {
            result.score = breakdown.score;
            result.rationale = breakdown.rationale();
        }
    }
}

/// Drop later results repeating an earlier URL or same-domain title.
fn dedupe_ranked(results: Vec<WebSearchResult>) -> Vec<WebSearchResult> {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    results
        .into_iter()
        .filter(|r| {
            let url_new = seen_urls.insert(normalize_url(&r.url));
            let title = r.title.trim().to_lowercase();
            let title_new = title.is_empty() || seen_titles.insert((r.domain.clone(), title));
            url_new && title_new
        })
        .collect()
}

fn cache_key(provider: &str, query: &str, max_results: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update([0]);
    hasher.update(query.trim().to_lowercase().as_bytes());
    hasher.update([0]);
    hasher.update(max_results.to_le_bytes());
    format!("{:x}", hasher.finalize())
}
