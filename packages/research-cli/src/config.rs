use anyhow::{Context, Result};
use dotenvy::dotenv;
use research::ApiKey;
use std::env;
use std::time::Duration;

/// Process configuration loaded from environment variables.
///
/// Provider keys are optional: a missing key removes that provider, and a
/// missing language-model key leaves synthesis in extractive mode.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub trove_api_key: Option<ApiKey>,
    pub tavily_api_key: Option<ApiKey>,
    pub brave_api_key: Option<ApiKey>,
    pub openai_api_key: Option<ApiKey>,
    pub openai_model: Option<String>,
    pub search_budget: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let search_budget = match env::var("SEARCH_BUDGET_SECS") {
            Ok(value) if !value.trim().is_empty() => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .context("SEARCH_BUDGET_SECS must be a whole number of seconds")?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://research.db".to_string()),
            trove_api_key: ApiKey::from_env("TROVE_API_KEY"),
            tavily_api_key: ApiKey::from_env("TAVILY_API_KEY"),
            brave_api_key: ApiKey::from_env("BRAVE_API_KEY"),
            openai_api_key: ApiKey::from_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty()),
            search_budget,
        })
    }

    /// Names of the configured providers, for the startup log.
    pub fn providers(&self) -> Vec<&'static str> {
        [
            ("trove", self.trove_api_key.is_some()),
            ("tavily", self.tavily_api_key.is_some()),
            ("brave", self.brave_api_key.is_some()),
            ("openai", self.openai_api_key.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}
