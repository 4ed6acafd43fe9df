//! Topic gate for domain-constrained runs.
//!
//! A record passes only if its text matches both the topic pattern and the
//! geography pattern. Dropped records are counted so the drop total can be
//! reported alongside the evidence.

use regex::Regex;

use crate::error::{ResearchError, Result};
use crate::types::evidence::EvidenceRecord;

/// Co-occurrence filter over topic and geography keywords.
#[derive(Debug, Clone)]
pub struct TopicGate {
    topic: Regex,
    geography: Regex,
}

impl TopicGate {
    /// Build from explicit patterns.
    pub fn new(topic: Regex, geography: Regex) -> Self {
        Self { topic, geography }
    }

    /// Build case-insensitive whole-word patterns from keyword lists.
    pub fn from_keywords<S: AsRef<str>>(topic: &[S], geography: &[S]) -> Result<Self> {
        Ok(Self {
            topic: keyword_pattern(topic)?,
            geography: keyword_pattern(geography)?,
        })
    }

    /// Whether `text` mentions both a topic and a geography keyword.
    pub fn matches(&self, text: &str) -> bool {
        self.topic.is_match(text) && self.geography.is_match(text)
    }

    /// Keep records passing the gate, returning them with the drop count.
    pub fn apply(&self, records: Vec<EvidenceRecord>) -> (Vec<EvidenceRecord>, usize) {
        let before = records.len();
        let kept: Vec<EvidenceRecord> = records
            .into_iter()
            .filter(|r| self.matches(&r.scoring_text()))
            .collect();
        let dropped = before - kept.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = kept.len(), "Topic gate dropped off-topic records");
        }
        (kept, dropped)
    }
}

fn keyword_pattern<S: AsRef<str>>(keywords: &[S]) -> Result<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Err(ResearchError::Config(
            "topic gate needs at least one keyword per pattern".to_string(),
        ));
    }

    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .map_err(|e| ResearchError::Config(format!("invalid topic gate pattern: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::evidence::EvidenceSource;

    fn record(title: &str) -> EvidenceRecord {
        EvidenceRecord::new(EvidenceSource::Archive, title, title, "https://trove.nla.gov.au/x")
    }

    #[test]
    fn test_requires_both_patterns() {
        let gate = TopicGate::from_keywords(&["ferry", "punt"], &["Harwood", "Clarence River"]).unwrap();

        assert!(gate.matches("The Harwood ferry"));
        assert!(gate.matches("PUNT on the clarence river"));
        assert!(!gate.matches("The Sydney ferry"));
        assert!(!gate.matches("Harwood sugar mill"));
        assert!(!gate.matches("ferryman of Harwoodville"));
    }

    #[test]
    fn test_apply_counts_drops() {
        let gate = TopicGate::from_keywords(&["ferry"], &["Harwood"]).unwrap();
        let (kept, dropped) = gate.apply(vec![
            record("Harwood ferry service"),
            record("Sydney ferry service"),
            record("Harwood council"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let empty: [&str; 0] = [];
        assert!(TopicGate::from_keywords(&["ferry"], &empty).is_err());
    }
}
