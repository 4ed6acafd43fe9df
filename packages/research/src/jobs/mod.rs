//! Batch archive ingestion jobs.
//!
//! ```text
//! submit ─► queued ─(task picks up)─► running ─(all pages)─► done
//!                                        │
//!                                        └─(ingestion error)─► error
//! ```
//!
//! Each job runs as its own background task, which exclusively owns the
//! job's mutable state; everyone else reads snapshots from the [`JobStore`].
//!
//! [`JobStore`]: crate::traits::store::JobStore

pub mod orchestrator;

pub use orchestrator::{BatchOrchestrator, JobHandle, JobRequest};
