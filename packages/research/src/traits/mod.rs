//! Core trait abstractions for the research pipeline.
//!
//! Every external collaborator (archive service, web-search providers, page
//! fetching, content extraction, the language model, persistence) sits behind
//! one of these traits so the pipeline can be driven by mocks in tests.

pub mod ai;
pub mod archive;
pub mod content;
pub mod searcher;
pub mod store;
