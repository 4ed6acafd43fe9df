//! Configuration types for retrieval, scoring, ingestion and synthesis.
//!
//! All numeric policy constants live here as serde-deserializable defaults so
//! they can be tuned without touching the algorithms.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Weights and bonuses for the relevance blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight of the normalized BM25-lite score. Default: 0.6.
    pub lexical: f64,

    /// Weight of the title overlap fraction. Default: 0.25.
    pub title: f64,

    /// Weight of the date proximity. Default: 0.15.
    pub date: f64,

    /// BM25-lite per-term weight. Default: 1.2.
    pub term_weight: f64,

    /// BM25-lite term saturation constant. Default: 1.5.
    pub term_saturation: f64,

    /// BM25-lite length-normalization constant. Default: 0.75.
    pub length_norm: f64,

    /// Reference document length in tokens. Default: 1000.
    pub reference_length: f64,

    /// Bonus for government and education domains. Default: 0.2.
    pub gov_edu_bonus: f64,

    /// Bonus for nonprofit and trusted archive domains. Default: 0.15.
    pub trusted_bonus: f64,

    /// Penalty for low-quality TLD patterns. Default: 0.1.
    pub low_quality_penalty: f64,

    /// Penalty per repeat occurrence of a domain. Default: 0.1.
    pub diversity_penalty: f64,

    /// Cap on the recency boost. Default: 0.15.
    pub recency_cap: f64,

    /// Numerator of the recency boost. Default: 0.1.
    pub recency_scale: f64,

    /// Date proximity when no window or year is known. Default: 0.5.
    pub neutral_date: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            lexical: 0.6,
            title: 0.25,
            date: 0.15,
            term_weight: 1.2,
            term_saturation: 1.5,
            length_norm: 0.75,
            reference_length: 1000.0,
            gov_edu_bonus: 0.2,
            trusted_bonus: 0.15,
            low_quality_penalty: 0.1,
            diversity_penalty: 0.1,
            recency_cap: 0.15,
            recency_scale: 0.1,
            neutral_date: 0.5,
        }
    }
}

/// Configuration for the web search aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned per call. Default: 10.
    pub max_results: usize,

    /// Wall-clock budget for the whole call. Default: 22s.
    #[serde(with = "duration_secs")]
    pub time_budget: Duration,

    /// Fraction of the budget after which no new provider is started. Default: 0.8.
    pub provider_cutoff: f64,

    /// Stop collecting at `max_results * candidate_multiplier` raw hits. Default: 2.
    pub candidate_multiplier: usize,

    /// Number of top candidates whose pages are fetched. Default: 4.
    pub fetch_top_n: usize,

    /// Simultaneous page fetches. Default: 4.
    pub fetch_concurrency: usize,

    /// Per-provider call timeout. Default: 8s.
    #[serde(with = "duration_secs")]
    pub provider_timeout: Duration,

    /// Per-fetch timeout. Default: 6s.
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,

    /// Quotes kept per result. Default: 2.
    pub quotes_per_result: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            time_budget: Duration::from_secs(22),
            provider_cutoff: 0.8,
            candidate_multiplier: 2,
            fetch_top_n: 4,
            fetch_concurrency: 4,
            provider_timeout: Duration::from_secs(8),
            fetch_timeout: Duration::from_secs(6),
            quotes_per_result: 2,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }
}

/// Configuration for archive ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Archive category (dataset tag). Default: "newspaper".
    pub category: String,

    /// Records per page. Default: 20.
    pub page_size: u32,

    /// Default page bound for jobs. Default: 10.
    pub max_pages: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            category: "newspaper".to_string(),
            page_size: 20,
            max_pages: 10,
        }
    }
}

/// Configuration for the synthesis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Evidence records embedded in the prompt. Default: 8.
    pub max_evidence: usize,

    /// Model attempts before falling back. Default: 2.
    pub max_attempts: usize,

    /// Findings built by the extractive fallback. Default: 5.
    pub fallback_findings: usize,

    /// Quotes per record in the prompt. Default: 2.
    pub quotes_per_record: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_evidence: 8,
            max_attempts: 2,
            fallback_findings: 5,
            quotes_per_record: 2,
        }
    }
}

/// Configuration for TTL caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries. Default: 256.
    pub capacity: usize,

    /// Time to live. Default: 15 minutes.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: Duration::from_secs(15 * 60),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_are_tunable_from_json() {
        let weights: ScoringWeights =
            serde_json::from_str(r#"{"lexical": 0.5, "diversity_penalty": 0.2}"#).unwrap();
        assert_eq!(weights.lexical, 0.5);
        assert_eq!(weights.diversity_penalty, 0.2);
        assert_eq!(weights.title, 0.25);
    }

    #[test]
    fn test_search_config_budget_in_seconds() {
        let config: SearchConfig = serde_json::from_str(r#"{"time_budget": 5}"#).unwrap();
        assert_eq!(config.time_budget, Duration::from_secs(5));
        assert_eq!(config.fetch_concurrency, 4);
    }
}
