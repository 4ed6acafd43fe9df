//! Prompt text for model synthesis.

use crate::quotes::{best_sentences, query_terms, DEFAULT_MAX_LEN};
use crate::types::evidence::EvidenceRecord;

pub const SYSTEM_PROMPT: &str = r#"You are a careful historical research assistant.

You are given a research question and a numbered set of evidence records. Each record has an id, title, year, url and short verbatim quotes.

Write a structured report:
- overview: two to four sentences answering the question from the evidence
- keyFindings: distinct findings, each with a short title, an insight, verbatim evidence quotes, the ids of the records it rests on, and a confidence between 0 and 1
- timeline: dated events drawn from the evidence, each with the ids of the records it rests on
- limitations: gaps or biases in the evidence
- nextQuestions: follow-up questions worth researching

Rules:
- Cite ONLY ids that appear in the evidence list, copied exactly
- Never invent facts, dates or quotes
- Lower confidence when a finding rests on a single record"#;

pub const STRICT_REMINDER: &str =
    "IMPORTANT: Return ONLY JSON matching the schema. No markdown, no commentary, no extra keys.";

/// User prompt embedding each record's id, title, year, url and quotes.
pub fn build_user_prompt(query: &str, evidence: &[EvidenceRecord], quotes_per_record: usize) -> String {
    let terms = query_terms(query);
    let mut prompt = format!("Research question: {query}\n\nEvidence:\n");

    for (i, record) in evidence.iter().enumerate() {
        let year = record
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        prompt.push_str(&format!(
            "\n[{}] id: {}\ntitle: {}\nyear: {}\nurl: {}\n",
            i + 1,
            record.id,
            record.title,
            year,
            record.url
        ));
        for quote in record_quotes(record, &terms, quotes_per_record) {
            prompt.push_str(&format!("quote: \"{quote}\"\n"));
        }
    }

    prompt
}

/// Up to `k` quotes: stored snippets first, then best sentences from the text.
pub fn record_quotes(record: &EvidenceRecord, terms: &[String], k: usize) -> Vec<String> {
    let mut quotes: Vec<String> = record.snippets.iter().take(k).cloned().collect();
    if quotes.len() < k && !record.text.is_empty() {
        for sentence in best_sentences(&record.text, terms, k, DEFAULT_MAX_LEN) {
            if quotes.len() >= k {
                break;
            }
            if !quotes.contains(&sentence) {
                quotes.push(sentence);
            }
        }
    }
    quotes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::evidence::EvidenceSource;

    #[test]
    fn test_prompt_embeds_record_fields() {
        let record = EvidenceRecord::new(
            EvidenceSource::Archive,
            "42",
            "Ashby Ferry Tenders",
            "https://nla.gov.au/42",
        )
        .with_year(1912)
        .with_snippet("one")
        .with_snippet("two")
        .with_snippet("three");

        let prompt = build_user_prompt("Ashby ferry", &[record], 2);
        assert!(prompt.contains("id: ARCHIVE:42"));
        assert!(prompt.contains("year: 1912"));
        assert!(prompt.contains("url: https://nla.gov.au/42"));
        assert_eq!(prompt.matches("quote:").count(), 2);
    }

    #[test]
    fn test_quotes_fall_back_to_text() {
        let record = EvidenceRecord::new(EvidenceSource::Web, "x", "X", "https://x.org")
            .with_text("Nothing here. The Ashby ferry ran daily. Unrelated text.");
        let quotes = record_quotes(&record, &query_terms("ashby ferry"), 2);
        assert_eq!(quotes, vec!["The Ashby ferry ran daily.".to_string()]);
    }
}
