//! Report assembly from the Evidence Index.
//!
//! Searches the index for a job's query terms, normalizes the engine's
//! native ranks into relevance scores, narrows to the job's region when the
//! records allow it, and turns the top records into findings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ResearchError, Result};
use crate::quotes::{query_terms, quote_record, tokenize};
use crate::scoring::{apply_breakdowns, title_overlap, ScoreInput, Scorer, ScoringContext};
use crate::synthesis::{extractive_findings, SynthesisEngine};
use crate::traits::store::EvidenceIndex;
use crate::types::config::SynthesisConfig;
use crate::types::evidence::EvidenceRecord;
use crate::types::findings::Findings;
use crate::types::job::Job;

/// Default number of records in a report.
pub const DEFAULT_REPORT_SIZE: usize = 8;

/// Index hits pulled per report record before ranking.
const CANDIDATES_PER_RECORD: usize = 5;

/// Short forms accepted for Australian state and territory names.
const REGION_ALIASES: &[(&str, &str)] = &[
    ("nsw", "new south wales"),
    ("vic", "victoria"),
    ("qld", "queensland"),
    ("sa", "south australia"),
    ("wa", "western australia"),
    ("tas", "tasmania"),
    ("nt", "northern territory"),
    ("act", "australian capital territory"),
];

/// What a report is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub job_id: Option<Uuid>,
    pub query: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub region: Option<String>,
}

impl ReportRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
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
}

impl From<&Job> for ReportRequest {
    fn from(job: &Job) -> Self {
        Self {
            job_id: Some(job.id),
            query: job.query.clone(),
            year_from: job.year_from,
            year_to: job.year_to,
            region: job.region.clone(),
        }
    }
}

/// Ranked evidence and the findings built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub job_id: Option<Uuid>,
    pub query: String,
    pub evidence: Vec<EvidenceRecord>,
    pub findings: Findings,

    /// Whether the region narrowed the evidence
    pub region_applied: bool,
}

/// Builds reports over an [`EvidenceIndex`].
pub struct ReportBuilder {
    index: Arc<dyn EvidenceIndex>,
    engine: Option<SynthesisEngine>,
    scorer: Scorer,
    limit: usize,
}

impl ReportBuilder {
    pub fn new(index: Arc<dyn EvidenceIndex>) -> Self {
        Self {
            index,
            engine: None,
            scorer: Scorer::default(),
            limit: DEFAULT_REPORT_SIZE,
        }
    }

    /// Hand selected evidence to a synthesis engine instead of building
    /// findings by title matching.
    pub fn with_engine(mut self, engine: SynthesisEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Report over everything ingested for `job`.
    pub async fn for_job(&self, job: &Job) -> Result<Report> {
        self.build(ReportRequest::from(job)).await
    }

    pub async fn build(&self, request: ReportRequest) -> Result<Report> {
        let terms = query_terms(&request.query);
        if terms.is_empty() {
            return Err(ResearchError::NoEvidenceFound {
                guidance: "the query has no searchable terms; use longer, more specific words".to_string(),
            });
        }

        let hits = self
            .index
            .search(&terms, self.limit * CANDIDATES_PER_RECORD)
            .await?;
        if hits.is_empty() {
            return Err(ResearchError::NoEvidenceFound {
                guidance: "nothing in the index matches; run an ingestion job or adjust the terms".to_string(),
            });
        }
        debug!(query = %request.query, hits = hits.len(), "Index search complete");

        let (mut records, ranks): (Vec<EvidenceRecord>, Vec<f64>) =
            hits.into_iter().map(|hit| (hit.record, hit.rank)).unzip();

        let ctx = ScoringContext::new(terms.clone()).with_year_range(request.year_from, request.year_to);
        let texts: Vec<String> = records.iter().map(|r| r.scoring_text()).collect();
        let inputs: Vec<ScoreInput<'_>> = records
            .iter()
            .zip(&texts)
            .map(|(r, text)| ScoreInput {
                text,
                ..ScoreInput::from(r)
            })
            .collect();
        let breakdowns = self.scorer.score_with_rank(&inputs, &ranks, &ctx);
        apply_breakdowns(&mut records, breakdowns);

        let mut region_applied = false;
        if let Some(region) = request.region.as_deref() {
            let (kept, dropped) = filter_region(&records, region);
            if kept.is_empty() {
                warn!(region = %region, records = records.len(), "No records mention the region, keeping all");
            } else {
                debug!(region = %region, dropped, "Region filter applied");
                records = kept;
                region_applied = true;
            }
        }
        records.truncate(self.limit);
        let quotes_per_record = SynthesisConfig::default().quotes_per_record;
        for record in &mut records {
            quote_record(record, &terms, quotes_per_record);
        }

        let findings = match &self.engine {
            Some(engine) => engine.synthesize(&request.query, &records).await,
            None => title_matched_findings(&request.query, &terms, &records),
        };

        info!(
            query = %request.query,
            evidence = records.len(),
            key_points = findings.key_points.len(),
            mode = ?findings.mode,
            "Report built"
        );

        Ok(Report {
            job_id: request.job_id,
            query: request.query,
            evidence: records,
            findings,
            region_applied,
        })
    }
}

/// Extractive findings ordered by how many query terms each title carries.
fn title_matched_findings(query: &str, terms: &[String], records: &[EvidenceRecord]) -> Findings {
    let mut ordered: Vec<EvidenceRecord> = records.to_vec();
    // stable: ties keep relevance order
    ordered.sort_by(|a, b| {
        title_overlap(&b.title, terms)
            .partial_cmp(&title_overlap(&a.title, terms))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    extractive_findings(query, &ordered, &SynthesisConfig::default())
}

/// Region names a record may mention: the region itself plus its alias.
pub fn region_names(region: &str) -> Vec<String> {
    let region = region.trim().to_lowercase();
    let mut names = vec![region.clone()];
    for (short, long) in REGION_ALIASES {
        if region == *short {
            names.push(long.to_string());
        } else if region == *long {
            names.push(short.to_string());
        }
    }
    names
}

/// Split records by whether their text mentions the region as whole words.
fn filter_region(records: &[EvidenceRecord], region: &str) -> (Vec<EvidenceRecord>, usize) {
    let names: Vec<Vec<String>> = region_names(region)
        .iter()
        .map(|name| tokenize(name).collect())
        .filter(|words: &Vec<String>| !words.is_empty())
        .collect();

    let kept: Vec<EvidenceRecord> = records
        .iter()
        .filter(|record| {
            let words: Vec<String> = tokenize(&record.scoring_text()).collect();
            names
                .iter()
                .any(|name| words.windows(name.len()).any(|window| window == name.as_slice()))
        })
        .cloned()
        .collect();
    let dropped = records.len() - kept.len();
    (kept, dropped)
}
