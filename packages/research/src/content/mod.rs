//! Page fetching and main-content extraction.
//!
//! Extraction is two-stage: selector-based main-content extraction first,
//! then a readability-style paragraph-density fallback. Either stage
//! yielding under [`MIN_CONTENT_CHARS`] characters counts as failure.

pub mod extractor;
pub mod fetcher;

pub use extractor::{MainContentExtractor, ReadabilityExtractor, TwoStageExtractor};
pub use fetcher::HttpFetcher;

/// Extracted text shorter than this is treated as no content.
pub const MIN_CONTENT_CHARS: usize = 200;
