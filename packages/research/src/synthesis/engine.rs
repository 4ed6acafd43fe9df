//! Synthesis engine: model path with a deterministic extractive fallback.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::prompts::{build_user_prompt, record_quotes, STRICT_REMINDER, SYSTEM_PROMPT};
use super::schema::{decode_response, response_schema, SynthesisResponse};
use super::validate::validate_citations;
use crate::error::{ResearchError, Result};
use crate::quotes::{query_terms, truncate_with_ellipsis, DEFAULT_MAX_LEN};
use crate::traits::ai::LanguageModel;
use crate::types::config::SynthesisConfig;
use crate::types::evidence::{EvidenceRecord, EvidenceSource};
use crate::types::findings::{Citation, Findings, KeyPoint, SynthesisMode, TimelineEntry};

/// Confidence assigned to every extractive finding.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Turns ranked evidence into [`Findings`].
///
/// Without a model every call takes the extractive path.
#[derive(Clone, Default)]
pub struct SynthesisEngine {
    model: Option<Arc<dyn LanguageModel>>,
    config: SynthesisConfig,
}

impl SynthesisEngine {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            config: SynthesisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn is_model_backed(&self) -> bool {
        self.model.is_some()
    }

    /// Synthesize findings from evidence ranked best first.
    ///
    /// Only the top `max_evidence` records are used. Never fails: model
    /// errors and invalid output end in extractive findings.
    pub async fn synthesize(&self, query: &str, evidence: &[EvidenceRecord]) -> Findings {
        let selected = &evidence[..evidence.len().min(self.config.max_evidence)];

        let Some(model) = &self.model else {
            debug!(query = %query, records = selected.len(), "No language model configured, using extractive synthesis");
            return extractive_findings(query, selected, &self.config);
        };
        if selected.is_empty() {
            return extractive_findings(query, selected, &self.config);
        }

        match self.model_findings(model.as_ref(), query, selected).await {
            Some(findings) => findings,
            None => {
                info!(query = %query, model = model.name(), "Falling back to extractive synthesis");
                extractive_findings(query, selected, &self.config)
            }
        }
    }

    async fn model_findings(
        &self,
        model: &dyn LanguageModel,
        query: &str,
        evidence: &[EvidenceRecord],
    ) -> Option<Findings> {
        let prompt = build_user_prompt(query, evidence, self.config.quotes_per_record);
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            let user = if attempt == 1 {
                prompt.clone()
            } else {
                format!("{prompt}\n\n{STRICT_REMINDER}")
            };

            let raw = match model
                .generate_structured(SYSTEM_PROMPT, &user, response_schema())
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(model = model.name(), attempt, error = %e, "Language model call failed");
                    return None;
                }
            };

            match decode_response(&raw).and_then(|response| into_findings(response, evidence)) {
                Ok(findings) => {
                    debug!(model = model.name(), attempt, key_points = findings.key_points.len(), "Model synthesis accepted");
                    return Some(findings);
                }
                Err(e) => {
                    warn!(model = model.name(), attempt, attempts, error = %e, "Model response rejected");
                }
            }
        }

        None
    }
}

/// Convert a decoded response, rejecting citations outside `evidence`.
fn into_findings(response: SynthesisResponse, evidence: &[EvidenceRecord]) -> Result<Findings> {
    let mut findings = Findings {
        overview: response.overview,
        key_points: response
            .key_findings
            .into_iter()
            .map(|k| KeyPoint {
                title: k.title,
                insight: k.insight,
                evidence: k.evidence,
                citations: k.citations,
                confidence: k.confidence,
            })
            .collect(),
        timeline: response
            .timeline
            .into_iter()
            .map(|t| TimelineEntry {
                date: t.date,
                event: t.event,
                citations: t.citations,
            })
            .collect(),
        limitations: response.limitations,
        next_questions: response.next_questions,
        citations: Vec::new(),
        mode: SynthesisMode::Model,
    };

    validate_citations(&findings, evidence)
        .map_err(|e| ResearchError::SchemaValidationFailed(e.to_string()))?;

    let cited: HashSet<&str> = findings.cited_ids().collect();
    let citations = evidence
        .iter()
        .filter(|r| cited.contains(r.id.as_str()))
        .map(Citation::from)
        .collect();
    findings.citations = citations;
    Ok(findings)
}

/// Deterministic findings built straight from the top ranked records.
///
/// Each key point takes a record's title, its quotes as evidence and its id
/// as the only citation, at a fixed confidence of 0.5.
pub fn extractive_findings(query: &str, evidence: &[EvidenceRecord], config: &SynthesisConfig) -> Findings {
    let top = &evidence[..evidence.len().min(config.fallback_findings)];
    let terms = query_terms(query);

    let key_points: Vec<KeyPoint> = top
        .iter()
        .map(|record| {
            let quotes = record_quotes(record, &terms, config.quotes_per_record);
            let insight = quotes
                .first()
                .cloned()
                .or_else(|| {
                    (!record.text.is_empty()).then(|| truncate_with_ellipsis(&record.text, DEFAULT_MAX_LEN))
                })
                .unwrap_or_else(|| record.title.clone());
            KeyPoint {
                title: if record.title.is_empty() {
                    record.id.clone()
                } else {
                    record.title.clone()
                },
                insight,
                evidence: quotes,
                citations: vec![record.id.clone()],
                confidence: FALLBACK_CONFIDENCE,
            }
        })
        .collect();

    let mut dated: Vec<&EvidenceRecord> = top.iter().filter(|r| r.year.is_some()).collect();
    dated.sort_by_key(|r| r.year);
    let timeline = dated
        .into_iter()
        .map(|record| TimelineEntry {
            date: record
                .published_date
                .clone()
                .or_else(|| record.year.map(|y| y.to_string()))
                .unwrap_or_default(),
            event: record.title.clone(),
            citations: vec![record.id.clone()],
        })
        .collect();

    let overview = if evidence.is_empty() {
        format!("No evidence records were found for \"{query}\".")
    } else {
        format!(
            "Found {} evidence records for \"{query}\"; the {} highest ranked are summarized below.",
            evidence.len(),
            top.len()
        )
    };

    let mut limitations =
        vec!["Findings quote sources directly without model synthesis.".to_string()];
    if top.iter().any(|r| r.source == EvidenceSource::Archive) {
        limitations.push("Archive text is OCR output and may contain transcription errors.".to_string());
    }
    if top.iter().all(|r| r.year.is_none()) {
        limitations.push("No publication dates were available to order events.".to_string());
    }

    let next_questions = match top.first() {
        Some(record) => vec![
            format!("Which other sources corroborate \"{}\"?", record.title),
            format!("What happened before and after the events described for \"{query}\"?"),
        ],
        None => vec![format!("Can \"{query}\" be rephrased or its date range widened?")],
    };

    Findings {
        overview,
        key_points,
        timeline,
        limitations,
        next_questions,
        citations: top.iter().map(Citation::from).collect(),
        mode: SynthesisMode::Extractive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLanguageModel;

    fn evidence(n: usize) -> Vec<EvidenceRecord> {
        (1..=n)
            .map(|i| {
                EvidenceRecord::new(
                    EvidenceSource::Archive,
                    i.to_string(),
                    format!("Ferry notice {i}"),
                    format!("https://nla.gov.au/{i}"),
                )
                .with_year(1900 + i as i32)
                .with_snippet(format!("The Ashby ferry notice number {i}."))
            })
            .collect()
    }

    fn valid_response(citation: &str) -> String {
        serde_json::json!({
            "overview": "The ferry operated for decades.",
            "keyFindings": [{
                "title": "Operation",
                "insight": "It ran daily.",
                "evidence": ["The Ashby ferry notice number 1."],
                "citations": [citation],
                "confidence": 0.8
            }],
            "timeline": [{"date": "1901", "event": "Notice", "citations": [citation]}],
            "limitations": [],
            "nextQuestions": []
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_no_model_is_extractive() {
        let engine = SynthesisEngine::default();
        let findings = engine.synthesize("Ashby ferry", &evidence(3)).await;
        assert_eq!(findings.mode, SynthesisMode::Extractive);
        assert_eq!(findings.key_points.len(), 3);
        assert!(findings.overview.contains('3'));
    }

    #[tokio::test]
    async fn test_valid_model_response_is_used() {
        let model = Arc::new(MockLanguageModel::new().with_response(valid_response("ARCHIVE:1")));
        let engine = SynthesisEngine::new(Some(model.clone()));

        let findings = engine.synthesize("Ashby ferry", &evidence(3)).await;
        assert_eq!(findings.mode, SynthesisMode::Model);
        assert_eq!(findings.citations.len(), 1);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_adds_strict_reminder() {
        let model = Arc::new(
            MockLanguageModel::new()
                .with_response("Sure! Here are the findings.")
                .with_response(valid_response("ARCHIVE:2")),
        );
        let engine = SynthesisEngine::new(Some(model.clone()));

        let findings = engine.synthesize("Ashby ferry", &evidence(3)).await;
        assert_eq!(findings.mode, SynthesisMode::Model);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains(STRICT_REMINDER));
        assert_eq!(prompts[1].matches(STRICT_REMINDER).count(), 1);
    }

    #[tokio::test]
    async fn test_invented_citation_falls_back() {
        let model = Arc::new(MockLanguageModel::new().with_fallback(valid_response("ARCHIVE:99")));
        let engine = SynthesisEngine::new(Some(model.clone()));

        let records = evidence(2);
        let findings = engine.synthesize("Ashby ferry", &records).await;
        assert_eq!(findings.mode, SynthesisMode::Extractive);
        assert_eq!(model.calls(), 2);
        assert!(validate_citations(&findings, &records).is_ok());
    }

    #[tokio::test]
    async fn test_model_error_falls_back_without_retry() {
        let model = Arc::new(MockLanguageModel::new().with_error("quota exceeded"));
        let engine = SynthesisEngine::new(Some(model.clone()));

        let findings = engine.synthesize("Ashby ferry", &evidence(2)).await;
        assert_eq!(findings.mode, SynthesisMode::Extractive);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_uses_top_eight() {
        let model = Arc::new(MockLanguageModel::new().with_response(valid_response("ARCHIVE:1")));
        let engine = SynthesisEngine::new(Some(model.clone()));

        engine.synthesize("Ashby ferry", &evidence(12)).await;
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("id: ARCHIVE:8\n"));
        assert!(!prompt.contains("id: ARCHIVE:9\n"));
    }

    #[test]
    fn test_extractive_shape() {
        let records = evidence(7);
        let findings = extractive_findings("Ashby ferry", &records, &SynthesisConfig::default());

        assert_eq!(findings.key_points.len(), 5);
        for (point, record) in findings.key_points.iter().zip(&records) {
            assert_eq!(point.confidence, FALLBACK_CONFIDENCE);
            assert_eq!(point.citations, vec![record.id.clone()]);
            assert_eq!(point.title, record.title);
            assert_eq!(point.evidence, record.snippets);
        }
        assert_eq!(findings.timeline.len(), 5);
        assert_eq!(findings.timeline[0].date, "1901");
        assert!(validate_citations(&findings, &records).is_ok());
    }

    #[test]
    fn test_extractive_empty() {
        let findings = extractive_findings("Ashby ferry", &[], &SynthesisConfig::default());
        assert!(findings.key_points.is_empty());
        assert!(findings.overview.contains("No evidence"));
    }
}
