//! API keys held in secure memory.
//!
//! Uses the `secrecy` crate so provider keys never end up in logs, debug
//! output or error messages.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A provider API key that redacts itself when printed.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Read a key from the environment, treating blank values as unset.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    /// Expose the key for use in a request header.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_redacted() {
        let key = ApiKey::new("trove-secret-key");
        assert!(!format!("{:?}", key).contains("trove-secret"));
        assert!(!format!("{}", key).contains("trove-secret"));
        assert_eq!(key.expose(), "trove-secret-key");
    }

    #[test]
    fn test_blank_env_is_unset() {
        std::env::set_var("RESEARCH_TEST_BLANK_KEY", "   ");
        assert!(ApiKey::from_env("RESEARCH_TEST_BLANK_KEY").is_none());
        assert!(ApiKey::from_env("RESEARCH_TEST_MISSING_KEY").is_none());
    }
}
