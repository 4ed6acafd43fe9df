//! Typed errors for the research library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the recoverable cases (provider outages, rejected filters, schema failures)
//! and surface the terminal ones (no evidence, fatal job errors).

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during retrieval, ingestion and synthesis.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// A search provider failed (network, auth, quota). Recovered by skipping it.
    #[error("provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// The archive service rejected a filter. Recovered by one retry without it.
    #[error("upstream rejected filter {filter} (status {status})")]
    UpstreamFilterRejected { filter: String, status: u16 },

    /// Language-model output did not match the response schema.
    #[error("schema validation failed: {0}")]
    SchemaValidationFailed(String),

    /// Nothing usable survived retrieval and filtering.
    #[error("no evidence found: {guidance}")]
    NoEvidenceFound { guidance: String },

    /// An ingestion job hit an unrecoverable error.
    #[error("job {job_id} failed: {message}")]
    JobFatal { job_id: Uuid, message: String },

    /// Job lookup failed
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// Illegal job state transition
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl ResearchError {
    /// Shorthand for a provider failure.
    pub fn provider(provider: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any displayable error as a storage failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string().into())
    }
}

impl From<sqlx::Error> for ResearchError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

impl From<reqwest::Error> for ResearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Box::new(err))
    }
}

/// A citation in synthesized findings that points outside the evidence set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("citation {citation} in {location} does not reference supplied evidence")]
pub struct CitationError {
    /// The offending citation id.
    pub citation: String,

    /// Where it was found, e.g. `keyPoints[1]` or `timeline[0]`.
    pub location: String,
}

/// Result type alias for research operations.
pub type Result<T> = std::result::Result<T, ResearchError>;
