//! Citation integrity check.

use std::collections::HashSet;

use crate::error::CitationError;
use crate::types::{evidence::EvidenceRecord, findings::Findings};

/// Every citation in key points and timeline must name a supplied record.
pub fn validate_citations(findings: &Findings, evidence: &[EvidenceRecord]) -> Result<(), CitationError> {
    let known: HashSet<&str> = evidence.iter().map(|r| r.id.as_str()).collect();

    let key_points = findings
        .key_points
        .iter()
        .enumerate()
        .flat_map(|(i, k)| k.citations.iter().map(move |c| (format!("keyPoints[{i}]"), c)));
    let timeline = findings
        .timeline
        .iter()
        .enumerate()
        .flat_map(|(i, t)| t.citations.iter().map(move |c| (format!("timeline[{i}]"), c)));

    for (location, citation) in key_points.chain(timeline) {
        if !known.contains(citation.as_str()) {
            return Err(CitationError {
                citation: citation.clone(),
                location,
            });
        }
    }
    Ok(())
}
