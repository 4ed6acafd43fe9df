//! Findings - the structured, citation-grounded research report.

use serde::{Deserialize, Serialize};

use super::evidence::{EvidenceRecord, EvidenceSource};

/// A synthesized report over a ranked evidence set.
///
/// Every citation id in `key_points` and `timeline` refers to an
/// [`EvidenceRecord::id`] from the evidence passed to synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub overview: String,

    #[serde(default)]
    pub key_points: Vec<KeyPoint>,

    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,

    #[serde(default)]
    pub limitations: Vec<String>,

    #[serde(default)]
    pub next_questions: Vec<String>,

    #[serde(default)]
    pub citations: Vec<Citation>,

    /// Which path produced these findings.
    #[serde(default)]
    pub mode: SynthesisMode,
}

impl Findings {
    /// All citation ids referenced by key points and timeline entries.
    pub fn cited_ids(&self) -> impl Iterator<Item = &str> {
        self.key_points
            .iter()
            .flat_map(|k| k.citations.iter())
            .chain(self.timeline.iter().flat_map(|t| t.citations.iter()))
            .map(String::as_str)
    }
}

/// A single finding with supporting quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub title: String,
    pub insight: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub event: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Source listing entry for the report footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    pub source: EvidenceSource,
}

impl From<&EvidenceRecord> for Citation {
    fn from(record: &EvidenceRecord) -> Self {
        Self {
            title: record.title.clone(),
            url: record.url.clone(),
            source: record.source,
        }
    }
}

/// How findings were produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Schema-validated language-model output
    Model,

    /// Deterministic extractive synthesis
    #[default]
    Extractive,
}
