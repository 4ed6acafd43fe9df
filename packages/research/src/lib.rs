//! Evidence Retrieval & Synthesis Library
//!
//! Answers historical research questions from two kinds of sources: a
//! paginated newspaper/catalogue archive and general web search. Evidence is
//! normalized, quoted, scored and ranked, optionally persisted to a
//! full-text Evidence Index by background ingestion jobs, and synthesized
//! into citation-grounded findings.
//!
//! # Usage
//!
//! ```rust,ignore
//! use research::{ResearchPipeline, ResearchRequest, WebSearchAggregator};
//! use research::testing::MockWebSearcher;
//!
//! let web = WebSearchAggregator::new(vec![Arc::new(MockWebSearcher::new("mock"))]);
//! let pipeline = ResearchPipeline::new(web).with_archive(archive);
//!
//! let outcome = pipeline
//!     .run(ResearchRequest::new("Ashby ferry Harwood Shire Council").with_years(Some(1900), Some(1925)))
//!     .await?;
//! println!("{}", outcome.findings.overview);
//! ```
//!
//! # Modules
//!
//! - [`archive`] - Archive query client, retries and record normalization
//! - [`search`] - Multi-provider web search under a time budget
//! - [`content`] - Page fetching and main-content extraction
//! - [`quotes`] - Best-sentence quote extraction
//! - [`scoring`] - Relevance scoring and the topic gate
//! - [`index`] - Evidence Index backends (SQLite FTS5, memory)
//! - [`jobs`] - Background batch ingestion jobs
//! - [`synthesis`] - Model synthesis with an extractive fallback
//! - [`report`] - Report assembly from the Evidence Index
//! - [`pipeline`] - One-shot retrieve, rank, synthesize
//! - [`plan`] - Deterministic search plans
//! - [`testing`] - Mock implementations for testing

pub mod archive;
pub mod cache;
pub mod content;
pub mod error;
pub mod index;
pub mod jobs;
pub mod pipeline;
pub mod plan;
pub mod quotes;
pub mod report;
pub mod scoring;
pub mod search;
pub mod security;
pub mod synthesis;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{CitationError, ResearchError, Result};
pub use traits::{
    ai::LanguageModel,
    archive::{ArchivePage, ArchiveRequest, ArchiveService},
    content::{ContentExtractor, ExtractedContent, PageFetcher},
    searcher::{SyncWebSearcher, WebHit, WebSearcher},
    store::{EvidenceIndex, IndexHit, JobStore},
};
pub use types::{
    config::{CacheConfig, IngestConfig, ScoringWeights, SearchConfig, SynthesisConfig},
    evidence::{EvidenceRecord, EvidenceSource, PlanScope, RetrievalStats, SearchPlanStep},
    findings::{Citation, Findings, KeyPoint, SynthesisMode, TimelineEntry},
    job::{Job, JobStatus},
};

pub use archive::{ArchiveClient, ArchiveQuery, ArchiveSearch, TroveArchive};
pub use cache::TtlCache;
pub use content::{HttpFetcher, MainContentExtractor, ReadabilityExtractor, TwoStageExtractor};
pub use index::{MemoryEvidenceIndex, SqliteEvidenceIndex};
pub use jobs::{BatchOrchestrator, JobHandle, JobRequest};
pub use pipeline::{ResearchOutcome, ResearchPipeline, ResearchRequest};
pub use plan::{build_search_plan, PlanDepth};
pub use quotes::best_sentences;
pub use report::{Report, ReportBuilder, ReportRequest};
pub use scoring::{Scorer, ScoringContext, TopicGate};
pub use search::{
    BlockingSearcher, BraveSearcher, HitCache, TavilySearcher, WebSearchAggregator,
    WebSearchOptions, WebSearchResult, WorkerPool,
};
pub use security::ApiKey;
pub use synthesis::{extractive_findings, validate_citations, OpenAiModel, SynthesisEngine};
