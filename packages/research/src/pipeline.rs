//! One-shot research: retrieve, filter, rank, synthesize.
//!
//! Archive and web retrieval run concurrently. Losing either source only
//! narrows the evidence; the call fails only when nothing usable survives.
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = ResearchPipeline::new(web)
//!     .with_archive(archive)
//!     .with_engine(SynthesisEngine::new(model));
//!
//! let outcome = pipeline
//!     .run(ResearchRequest::new("Ashby ferry Harwood").with_years(Some(1900), Some(1925)))
//!     .await?;
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveClient, ArchiveQuery};
use crate::error::{ResearchError, Result};
use crate::quotes::{query_terms, quote_record};
use crate::scoring::{Scorer, ScoringContext, TopicGate};
use crate::search::{WebSearchAggregator, WebSearchOptions};
use crate::synthesis::SynthesisEngine;
use crate::traits::store::EvidenceIndex;
use crate::types::evidence::{dedupe_records, EvidenceRecord, RetrievalStats};
use crate::types::findings::Findings;

/// A research question with its filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub query: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<String>,
    pub max_results: usize,
    pub prefer_recent: bool,
    pub fetch_content: bool,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            year_from: None,
            year_to: None,
            region: None,
            max_results: 10,
            prefer_recent: false,
            fetch_content: true,
        }
    }

    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
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

    /// What to suggest when nothing was found.
    fn guidance(&self) -> String {
        let mut hints = Vec::new();
        match (self.year_from, self.year_to) {
            (Some(from), Some(to)) => hints.push(format!("widen the date range beyond {from}-{to}")),
            (Some(_), None) | (None, Some(_)) => hints.push("widen the date range".to_string()),
            (None, None) => {}
        }
        if let Some(region) = &self.region {
            hints.push(format!("drop the region filter ({region})"));
        }
        hints.push("adjust or broaden the search terms".to_string());
        hints.join("; ")
    }
}

/// Ranked evidence, retrieval stats and findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutcome {
    pub evidence: Vec<EvidenceRecord>,
    pub stats: RetrievalStats,
    pub findings: Findings,
}

/// Archive plus web retrieval with gating, ranking and synthesis.
pub struct ResearchPipeline {
    archive: Option<ArchiveClient>,
    web: WebSearchAggregator,
    gate: Option<TopicGate>,
    scorer: Scorer,
    engine: SynthesisEngine,
    index: Option<Arc<dyn EvidenceIndex>>,
}

impl ResearchPipeline {
    pub fn new(web: WebSearchAggregator) -> Self {
        Self {
            archive: None,
            web,
            gate: None,
            scorer: Scorer::default(),
            engine: SynthesisEngine::default(),
            index: None,
        }
    }

    pub fn with_archive(mut self, archive: ArchiveClient) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Drop records not mentioning both a topic and a geography keyword.
    pub fn with_gate(mut self, gate: TopicGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_engine(mut self, engine: SynthesisEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Upsert retrieved evidence so later reports can use it.
    pub fn with_index(mut self, index: Arc<dyn EvidenceIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Retrieve, rank and synthesize.
    pub async fn run(&self, request: ResearchRequest) -> Result<ResearchOutcome> {
        let (evidence, stats) = self.retrieve(&request).await?;
        let findings = self.engine.synthesize(&request.query, &evidence).await;

        info!(
            query = %request.query,
            retrieved = stats.retrieved,
            dropped_off_topic = stats.dropped_off_topic,
            used = stats.used,
            mode = ?findings.mode,
            "Research complete"
        );

        Ok(ResearchOutcome {
            evidence,
            stats,
            findings,
        })
    }

    /// Ranked evidence and stats without synthesis.
    ///
    /// Returns [`ResearchError::NoEvidenceFound`] when nothing survives.
    pub async fn retrieve(&self, request: &ResearchRequest) -> Result<(Vec<EvidenceRecord>, RetrievalStats)> {
        let options = WebSearchOptions::from_config(self.web.config())
            .with_max_results(request.max_results)
            .with_prefer_recent(request.prefer_recent)
            .with_fetch_content(request.fetch_content)
            .with_year_range(request.year_from, request.year_to);

        let (archive_records, web_results) = tokio::join!(
            self.archive_evidence(request),
            self.web.search_web(&request.query, options)
        );
        debug!(
            archive = archive_records.len(),
            web = web_results.len(),
            "Retrieval sources complete"
        );

        // ids are provider-prefixed, so archive and web never collide
        let mut merged: IndexMap<String, EvidenceRecord> = IndexMap::new();
        for record in archive_records
            .into_iter()
            .chain(web_results.into_iter().map(|r| r.into_evidence()))
        {
            merged.entry(record.id.clone()).or_insert(record);
        }
        let mut evidence = dedupe_records(merged.into_values().collect());
        let retrieved = evidence.len();

        let mut dropped_off_topic = 0;
        if let Some(gate) = &self.gate {
            let (kept, dropped) = gate.apply(evidence);
            evidence = kept;
            dropped_off_topic = dropped;
        }

        if evidence.is_empty() {
            let guidance = request.guidance();
            info!(query = %request.query, retrieved, dropped_off_topic, guidance = %guidance, "No usable evidence");
            return Err(ResearchError::NoEvidenceFound { guidance });
        }

        let ctx = ScoringContext::new(query_terms(&request.query))
            .with_year_range(request.year_from, request.year_to)
            .with_prefer_recent(request.prefer_recent);
        self.scorer.rank_records(&mut evidence, &ctx);
        evidence.truncate(request.max_results);

        if let Some(index) = &self.index {
            if let Err(e) = index.upsert_batch(&evidence).await {
                warn!(query = %request.query, error = %e, "Failed to persist evidence");
            }
        }

        let stats = RetrievalStats {
            retrieved,
            dropped_off_topic,
            used: evidence.len(),
        };
        Ok((evidence, stats))
    }

    async fn archive_evidence(&self, request: &ResearchRequest) -> Vec<EvidenceRecord> {
        let Some(archive) = &self.archive else {
            return Vec::new();
        };
        let query = ArchiveQuery::new(&request.query)
            .years(request.year_from, request.year_to)
            .region(request.region.as_deref());

        match archive.search(query).await {
            Ok(result) => {
                if result.region_dropped {
                    debug!(query = %request.query, "Archive results are not region filtered");
                }
                let terms = query_terms(&request.query);
                let k = self.web.config().quotes_per_result;
                let mut records = result.records;
                for record in &mut records {
                    quote_record(record, &terms, k);
                }
                records
            }
            Err(e) => {
                warn!(query = %request.query, error = %e, "Archive search failed, continuing with web only");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryEvidenceIndex;
    use crate::testing::{FailingWebSearcher, MockArchive, MockWebSearcher};
    use crate::traits::searcher::{WebHit, WebSearcher};
    use crate::types::findings::SynthesisMode;
    use serde_json::json;

    fn archive() -> ArchiveClient {
        ArchiveClient::new(Arc::new(MockArchive::new().with_page(
            None,
            vec![
                json!({"id": "1", "heading": "Ashby ferry", "date": "1912-01-01", "troveUrl": "https://nla.gov.au/1", "snippet": "The Ashby ferry at Harwood."}),
                json!({"id": "2", "heading": "Cane prices", "date": "1913-01-01", "troveUrl": "https://nla.gov.au/2", "snippet": "Cane prices rose in Sydney."}),
            ],
            None,
        )))
    }

    fn down() -> WebSearchAggregator {
        let providers: Vec<Arc<dyn WebSearcher>> = vec![Arc::new(FailingWebSearcher::new("down"))];
        WebSearchAggregator::new(providers)
    }

    #[tokio::test]
    async fn test_web_outage_uses_archive_only() {
        let pipeline = ResearchPipeline::new(down()).with_archive(archive());
        let outcome = pipeline
            .run(ResearchRequest::new("Ashby ferry").with_fetch_content(false))
            .await
            .unwrap();

        assert_eq!(outcome.stats.retrieved, 2);
        assert_eq!(outcome.stats.used, 2);
        assert_eq!(outcome.evidence[0].id, "ARCHIVE:1");
        assert_eq!(outcome.findings.mode, SynthesisMode::Extractive);
    }

    #[tokio::test]
    async fn test_gate_counts_dropped() {
        let gate = TopicGate::from_keywords(&["ferry", "punt"], &["harwood", "clarence"]).unwrap();
        let pipeline = ResearchPipeline::new(down()).with_archive(archive()).with_gate(gate);

        let (evidence, stats) = pipeline
            .retrieve(&ResearchRequest::new("Ashby ferry"))
            .await
            .unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(
            stats,
            RetrievalStats {
                retrieved: 2,
                dropped_off_topic: 1,
                used: 1
            }
        );
    }

    #[tokio::test]
    async fn test_nothing_found_has_guidance() {
        let pipeline = ResearchPipeline::new(down());
        let err = pipeline
            .run(ResearchRequest::new("Ashby ferry").with_years(Some(1900), Some(1925)))
            .await
            .unwrap_err();
        match err {
            ResearchError::NoEvidenceFound { guidance } => {
                assert!(guidance.contains("1900-1925"));
                assert!(guidance.contains("search terms"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_merges_web_and_persists() {
        let web = MockWebSearcher::new("web").with_default(vec![WebHit::new("web", "https://clarence.nsw.gov.au/ferry")
            .with_title("Ashby ferry history")
            .with_snippet("The Ashby ferry served Harwood Island.")]);
        let providers: Vec<Arc<dyn WebSearcher>> = vec![Arc::new(web)];
        let index = Arc::new(MemoryEvidenceIndex::new());
        let pipeline = ResearchPipeline::new(WebSearchAggregator::new(providers))
            .with_archive(archive())
            .with_index(index.clone());

        let outcome = pipeline
            .run(ResearchRequest::new("Ashby ferry").with_fetch_content(false))
            .await
            .unwrap();

        assert_eq!(outcome.stats.retrieved, 3);
        assert!(outcome.evidence.iter().any(|r| r.id.starts_with("WEB:")));
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_archive_evidence_is_quoted() {
        let filler = "Cattle prices at the saleyards were steady for the week under review. ".repeat(5);
        let text = format!("{filler}The Ashby ferry was taken over by the Harwood Shire Council.");
        let archive = ArchiveClient::new(Arc::new(MockArchive::new().with_page(
            None,
            vec![json!({"id": "7", "heading": "Council business", "date": "1912-01-01", "troveUrl": "https://nla.gov.au/7", "articleText": text})],
            None,
        )));
        let pipeline = ResearchPipeline::new(down()).with_archive(archive);

        let outcome = pipeline
            .run(ResearchRequest::new("Ashby ferry Harwood").with_fetch_content(false))
            .await
            .unwrap();

        let record = &outcome.evidence[0];
        assert_eq!(
            record.snippets,
            vec!["The Ashby ferry was taken over by the Harwood Shire Council."]
        );
        assert!(record.text.starts_with("Cattle prices"));
        assert_eq!(outcome.findings.key_points[0].evidence, record.snippets);
    }

    #[tokio::test]
    async fn test_archive_duplicates_are_collapsed() {
        let archive = ArchiveClient::new(Arc::new(MockArchive::new().with_page(
            None,
            vec![
                json!({"id": "1", "heading": "Ashby Ferry", "troveUrl": "https://nla.gov.au/x", "snippet": "The Ashby ferry."}),
                json!({"id": "2", "heading": "Ashby Ferry", "troveUrl": "https://nla.gov.au/X/", "snippet": "The Ashby ferry."}),
            ],
            None,
        )));
        let pipeline = ResearchPipeline::new(down()).with_archive(archive);

        let (evidence, stats) = pipeline
            .retrieve(&ResearchRequest::new("Ashby ferry"))
            .await
            .unwrap();
        assert_eq!(stats.used, 1);
        assert_eq!(stats.retrieved, 1);
        assert_eq!(evidence[0].id, "ARCHIVE:1");
    }
}
