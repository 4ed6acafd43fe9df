//! Data types shared across the research pipeline.

pub mod config;
pub mod evidence;
pub mod findings;
pub mod job;
