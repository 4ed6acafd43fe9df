//! Evidence Index storage backends.
//!
//! - [`SqliteEvidenceIndex`]: SQLite with an FTS5 projection, also the job store
//! - [`MemoryEvidenceIndex`]: in-process maps for tests and one-shot runs

pub mod memory;
pub mod sqlite;

pub use memory::MemoryEvidenceIndex;
pub use sqlite::SqliteEvidenceIndex;

use crate::types::evidence::EvidenceRecord;

/// Upsert merge rule shared by every backend: last write wins on
/// metadata, but stored text is only replaced by a strictly longer text
/// and stored snippets only by strictly longer snippets.
pub fn merge_upsert(existing: &EvidenceRecord, incoming: &EvidenceRecord) -> EvidenceRecord {
    let mut merged = incoming.clone();
    if merged.year.is_none() {
        merged.year = existing.year;
    }
    if merged.published_date.is_none() {
        merged.published_date = existing.published_date.clone();
    }
    if merged.dataset.is_none() {
        merged.dataset = existing.dataset.clone();
    }
    if incoming.text.chars().count() <= existing.text.chars().count() {
        merged.text = existing.text.clone();
    }
    if incoming.snippet_chars() <= existing.snippet_chars() {
        merged.snippets = existing.snippets.clone();
    }
    merged
}

/// FTS5 MATCH expression OR-combining quoted terms; `None` without terms.
pub fn fts_match_expression(terms: &[String]) -> Option<String> {
    let quoted: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    (!quoted.is_empty()).then(|| quoted.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::evidence::EvidenceSource;

    fn record(text: &str) -> EvidenceRecord {
        EvidenceRecord::new(EvidenceSource::Archive, "1", "Ferry", "https://nla.gov.au/1")
            .with_snippet(text)
            .with_text(text)
    }

    #[test]
    fn test_merge_keeps_longer_text() {
        let long = record("The Ashby ferry was replaced in 1912.");
        let short = record("Ashby ferry.");

        assert_eq!(merge_upsert(&long, &short).text, long.text);
        assert_eq!(merge_upsert(&short, &long).text, long.text);
        assert_eq!(merge_upsert(&long, &long.clone()).snippets, long.snippets);
    }

    #[test]
    fn test_merge_keys_snippets_on_snippet_length() {
        let text = "The Ashby ferry was replaced in 1912 by a larger punt.";
        let short = record(text);
        let longer = EvidenceRecord::new(EvidenceSource::Archive, "1", "Ferry", "https://nla.gov.au/1")
            .with_snippet("The Ashby ferry was replaced in 1912 by a larger punt, said the council.")
            .with_text(text);

        let merged = merge_upsert(&short, &longer);
        assert_eq!(merged.snippets, longer.snippets);
        assert_eq!(merged.text, text);
        assert_eq!(merge_upsert(&longer, &short).snippets, longer.snippets);
    }

    #[test]
    fn test_fts_expression() {
        let terms = vec!["ashby".to_string(), "ferry".to_string()];
        assert_eq!(fts_match_expression(&terms).as_deref(), Some("\"ashby\" OR \"ferry\""));
        assert!(fts_match_expression(&[]).is_none());
    }
}
