//! Relevance scoring.
//!
//! Blends lexical match, title overlap, date proximity, domain reputation,
//! recency and a cumulative duplicate-domain penalty into one score, then
//! min-max renormalizes across the candidate set so no single feature can
//! saturate the [0, 1] cap.

pub mod domain;
pub mod gate;

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};

use crate::quotes::tokenize;
use crate::types::{config::ScoringWeights, evidence::EvidenceRecord};

pub use domain::{classify, reputation_bonus, Reputation};
pub use gate::TopicGate;

/// Per-record scoring input.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub title: &'a str,

    /// Title, snippet and extracted text joined
    pub text: &'a str,

    pub year: Option<i32>,

    /// Raw publication date, used for recency
    pub published: Option<&'a str>,

    pub domain: &'a str,
}

impl<'a> From<&'a EvidenceRecord> for ScoreInput<'a> {
    fn from(record: &'a EvidenceRecord) -> Self {
        Self {
            title: &record.title,
            text: &record.text,
            year: record.year,
            published: record.published_date.as_deref(),
            domain: &record.domain,
        }
    }
}

/// Query-level scoring context.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub terms: Vec<String>,

    /// Requested inclusive year window
    pub year_range: Option<(i32, i32)>,

    pub prefer_recent: bool,

    /// Reference date for recency
    pub today: NaiveDate,

    /// Domains already seen before this batch, with counts
    pub seen_domains: HashMap<String, usize>,
}

impl ScoringContext {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms,
            year_range: None,
            prefer_recent: false,
            today: Utc::now().date_naive(),
            seen_domains: HashMap::new(),
        }
    }

    pub fn with_year_range(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_range = match (year_from, year_to) {
            (Some(from), Some(to)) => Some((from.min(to), from.max(to))),
            (Some(from), None) => Some((from, from)),
            (None, Some(to)) => Some((to, to)),
            (None, None) => None,
        };
        self
    }

    pub fn with_prefer_recent(mut self, prefer_recent: bool) -> Self {
        self.prefer_recent = prefer_recent;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_seen_domains(mut self, seen: HashMap<String, usize>) -> Self {
        self.seen_domains = seen;
        self
    }
}

/// Every feature behind a score, for rationale and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub lexical_raw: f64,
    pub lexical: f64,
    pub title_overlap: f64,
    pub date_proximity: f64,
    pub domain_reputation: f64,
    pub recency_boost: f64,

    /// Magnitude of the duplicate-domain penalty
    pub diversity_penalty: f64,

    /// Clamped blend before batch renormalization
    pub blended: f64,

    /// Final score in [0, 1]
    pub score: f64,
}

impl ScoreBreakdown {
    pub fn rationale(&self) -> String {
        format!(
            "lexical {:.2}, title {:.2}, date {:.2}, domain {:+.2}, recency {:.2}, diversity -{:.2}",
            self.lexical,
            self.title_overlap,
            self.date_proximity,
            self.domain_reputation,
            self.recency_boost,
            self.diversity_penalty
        )
    }
}

/// Composite relevance scorer.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a batch, computing and min-max normalizing BM25-lite in-batch.
    ///
    /// Output order matches input order.
    pub fn score_batch(&self, inputs: &[ScoreInput<'_>], ctx: &ScoringContext) -> Vec<ScoreBreakdown> {
        let raw: Vec<f64> = inputs
            .iter()
            .map(|i| bm25_lite(i.text, &ctx.terms, &self.weights))
            .collect();
        let lexical = normalize_lexical(&raw);
        self.score_with_lexical(inputs, &raw, &lexical, ctx)
    }

    /// Score a batch whose lexical feature was ranked elsewhere (e.g. by the
    /// full-text engine). `raw_rank` is min-max normalized here.
    pub fn score_with_rank(
        &self,
        inputs: &[ScoreInput<'_>],
        raw_rank: &[f64],
        ctx: &ScoringContext,
    ) -> Vec<ScoreBreakdown> {
        let lexical = normalize_lexical(raw_rank);
        self.score_with_lexical(inputs, raw_rank, &lexical, ctx)
    }

    fn score_with_lexical(
        &self,
        inputs: &[ScoreInput<'_>],
        raw: &[f64],
        lexical: &[f64],
        ctx: &ScoringContext,
    ) -> Vec<ScoreBreakdown> {
        let w = &self.weights;

        let mut breakdowns: Vec<ScoreBreakdown> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| ScoreBreakdown {
                lexical_raw: raw.get(i).copied().unwrap_or(0.0),
                lexical: lexical.get(i).copied().unwrap_or(0.0),
                title_overlap: title_overlap(input.title, &ctx.terms),
                date_proximity: date_proximity(input.year, ctx.year_range, w.neutral_date),
                domain_reputation: reputation_bonus(input.domain, w),
                recency_boost: if ctx.prefer_recent {
                    recency_boost(input.published, ctx.today, w)
                } else {
                    0.0
                },
                ..Default::default()
            })
            .collect();

        // Ranked pass: walk in pre-penalty order so the first-seen copy of a
        // domain keeps its score and every later copy pays cumulatively.
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.sort_by(|&a, &b| {
            self.blend(&breakdowns[b])
                .partial_cmp(&self.blend(&breakdowns[a]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut seen = ctx.seen_domains.clone();
        for idx in order {
            let domain = inputs[idx].domain;
            if domain.is_empty() {
                continue;
            }
            let count = seen.entry(domain.to_string()).or_insert(0);
            breakdowns[idx].diversity_penalty = w.diversity_penalty * *count as f64;
            *count += 1;
        }

        for b in &mut breakdowns {
            b.blended = (self.blend(b) - b.diversity_penalty.abs()).clamp(0.0, 1.0);
        }

        let blended: Vec<f64> = breakdowns.iter().map(|b| b.blended).collect();
        let finals = min_max_normalize(&blended).unwrap_or(blended);
        for (b, score) in breakdowns.iter_mut().zip(finals) {
            b.score = score.clamp(0.0, 1.0);
        }

        breakdowns
    }

    fn blend(&self, b: &ScoreBreakdown) -> f64 {
        let w = &self.weights;
        w.lexical * b.lexical
            + w.title * b.title_overlap
            + w.date * b.date_proximity
            + b.domain_reputation
            + b.recency_boost
    }

    /// Score records in place, writing score and rationale, and sort descending.
    pub fn rank_records(&self, records: &mut Vec<EvidenceRecord>, ctx: &ScoringContext) {
        let texts: Vec<String> = records.iter().map(|r| r.scoring_text()).collect();
        let inputs: Vec<ScoreInput<'_>> = records
            .iter()
            .zip(&texts)
            .map(|(r, text)| ScoreInput {
                text,
                ..ScoreInput::from(r)
            })
            .collect();
        let breakdowns = self.score_batch(&inputs, ctx);
        apply_breakdowns(records, breakdowns);
    }
}

/// Write scores into records and sort by score descending (stable).
pub fn apply_breakdowns(records: &mut Vec<EvidenceRecord>, breakdowns: Vec<ScoreBreakdown>) {
    for (record, breakdown) in records.iter_mut().zip(breakdowns) {
        record.relevance_score = breakdown.score;
        record.rationale = breakdown.rationale();
    }
    records.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// BM25-lite: for each distinct term,
/// `tf/(tf+k1) * w*(1 + b*(L_ref/L_doc))`, summed.
pub fn bm25_lite(text: &str, terms: &[String], weights: &ScoringWeights) -> f64 {
    let tokens: Vec<String> = tokenize(text).collect();
    let doc_len = tokens.len().max(1) as f64;
    let length_factor =
        weights.term_weight * (1.0 + weights.length_norm * (weights.reference_length / doc_len));

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let distinct: HashSet<&str> = terms.iter().map(String::as_str).collect();
    distinct
        .into_iter()
        .map(|term| {
            let tf = counts.get(term).copied().unwrap_or(0) as f64;
            if tf == 0.0 {
                0.0
            } else {
                tf / (tf + weights.term_saturation) * length_factor
            }
        })
        .sum()
}

/// Fraction of query terms present in the title.
pub fn title_overlap(title: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = tokenize(title).collect();
    terms.iter().filter(|t| words.contains(*t)).count() as f64 / terms.len() as f64
}

/// `1/(1+|year-mid|/halfRange)`, or `neutral` without a window or year.
pub fn date_proximity(year: Option<i32>, range: Option<(i32, i32)>, neutral: f64) -> f64 {
    match (year, range) {
        (Some(year), Some((from, to))) => {
            let mid = (f64::from(from) + f64::from(to)) / 2.0;
            let half = ((f64::from(to) - f64::from(from)) / 2.0).max(1.0);
            1.0 / (1.0 + (year as f64 - mid).abs() / half)
        }
        _ => neutral,
    }
}

/// `min(cap, scale/ln(1+ageDays))`, 0 when the date is unknown.
pub fn recency_boost(published: Option<&str>, today: NaiveDate, weights: &ScoringWeights) -> f64 {
    let Some(date) = published.and_then(parse_date) else {
        return 0.0;
    };
    let age_days = (today - date).num_days().max(1) as f64;
    (weights.recency_scale / (1.0 + age_days).ln()).min(weights.recency_cap)
}

/// Parse the common provider date shapes.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Min-max normalize; `None` when the values have no spread.
pub fn min_max_normalize(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() || !(max - min).is_finite() || max - min < 1e-12 {
        return None;
    }
    Some(values.iter().map(|v| (v - min) / (max - min)).collect())
}

/// Lexical normalization: min-max, or 1/0 by presence when there is no spread.
fn normalize_lexical(raw: &[f64]) -> Vec<f64> {
    min_max_normalize(raw)
        .unwrap_or_else(|| raw.iter().map(|v| if *v > 0.0 { 1.0 } else { 0.0 }).collect())
}
