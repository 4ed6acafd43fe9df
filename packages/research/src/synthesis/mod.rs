//! Citation-grounded synthesis.
//!
//! The engine asks a language model for schema-constrained JSON, decodes and
//! validates it (shape and citations), retries once with a stricter prompt,
//! and otherwise falls back to deterministic extractive findings. The
//! fallback is a first-class mode, used whenever no model is configured.

pub mod engine;
pub mod openai;
pub mod prompts;
pub mod schema;
pub mod validate;

pub use engine::{extractive_findings, SynthesisEngine};
pub use openai::OpenAiModel;
pub use schema::{decode_response, response_schema, SynthesisResponse};
pub use validate::validate_citations;
