//! Static domain reputation lookup.

use crate::types::config::ScoringWeights;

/// Archives and reference sites treated like nonprofits.
const TRUSTED_ARCHIVES: &[&str] = &[
    "archive.org",
    "wikipedia.org",
    "trove.nla.gov.au",
    "hathitrust.org",
    "jstor.org",
    "europeana.eu",
    "paperspast.natlib.govt.nz",
    "britishnewspaperarchive.co.uk",
    "chroniclingamerica.loc.gov",
    "familysearch.org",
    "adb.anu.edu.au",
];

/// TLDs that mostly host spam or content farms.
const LOW_QUALITY_TLDS: &[&str] = &[
    "xyz", "top", "click", "loan", "work", "gq", "tk", "ml", "cf", "ga", "buzz", "icu", "rest",
];

/// Reputation class of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reputation {
    GovernmentOrEducation,
    Trusted,
    LowQuality,
    Neutral,
}

/// Classify a lowercased host.
pub fn classify(domain: &str) -> Reputation {
    let domain = domain.trim_start_matches("www.");
    if domain.is_empty() {
        return Reputation::Neutral;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let is_gov_edu = labels
        .iter()
        .skip(1)
        .any(|l| matches!(*l, "gov" | "edu" | "govt" | "mil" | "ac"));
    if is_gov_edu {
        return Reputation::GovernmentOrEducation;
    }

    let trusted = TRUSTED_ARCHIVES
        .iter()
        .any(|t| domain == *t || domain.ends_with(&format!(".{t}")));
    if trusted || labels.last() == Some(&"org") || domain.contains(".org.") {
        return Reputation::Trusted;
    }

    if labels
        .last()
        .is_some_and(|tld| LOW_QUALITY_TLDS.contains(tld))
    {
        return Reputation::LowQuality;
    }

    Reputation::Neutral
}

/// Additive reputation adjustment for a domain.
pub fn reputation_bonus(domain: &str, weights: &ScoringWeights) -> f64 {
    match classify(domain) {
        Reputation::GovernmentOrEducation => weights.gov_edu_bonus,
        Reputation::Trusted => weights.trusted_bonus,
        Reputation::LowQuality => -weights.low_quality_penalty,
        Reputation::Neutral => 0.0,
    }
}
