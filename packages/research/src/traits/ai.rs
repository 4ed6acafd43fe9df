//! Language model trait for structured synthesis.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that can answer with JSON constrained by a schema.
///
/// Implementations return the raw response text; decoding and validation
/// happen in [`crate::synthesis`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str;

    /// Request a response conforming to `schema`.
    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<String>;
}
