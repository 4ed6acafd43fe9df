mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use research::{
    build_search_plan, ArchiveClient, BatchOrchestrator, BraveSearcher, CacheConfig,
    EvidenceIndex, EvidenceRecord, Findings, HitCache, HttpFetcher, Job, JobRequest, JobStore,
    LanguageModel, OpenAiModel, PlanDepth, ReportBuilder, ReportRequest, ResearchError,
    ResearchPipeline, ResearchRequest, SearchConfig, SqliteEvidenceIndex, SynthesisEngine,
    TavilySearcher, TroveArchive, WebSearchAggregator, WebSearcher,
};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "research", version, about = "Evidence retrieval and synthesis for historical research questions")]
struct Cli {
    /// Print machine-readable JSON instead of a formatted summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// The research question.
    query: String,
    #[arg(long)]
    from: Option<i32>,
    #[arg(long)]
    to: Option<i32>,
    /// Region filter, e.g. "New South Wales".
    #[arg(long)]
    region: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a one-shot research query over the archive and the web.
    Search {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value_t = 10)]
        max_results: usize,
        /// Boost recently published web pages.
        #[arg(long)]
        recent: bool,
        /// Use provider snippets only; skip page fetching.
        #[arg(long)]
        no_fetch: bool,
        /// Also store the evidence in the Evidence Index.
        #[arg(long)]
        save: bool,
    },
    /// Ingest archive pages into the Evidence Index as a batch job.
    Ingest {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Show one job.
    Job { id: Uuid },
    /// List recent jobs.
    Jobs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Build a report from the Evidence Index, for a job or a query.
    Report {
        /// Job whose query, years and region to use.
        #[arg(long, conflicts_with = "query")]
        job: Option<Uuid>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, requires = "query")]
        from: Option<i32>,
        #[arg(long, requires = "query")]
        to: Option<i32>,
        /// Keep records mentioning this region, e.g. "NSW".
        #[arg(long, requires = "query")]
        region: Option<String>,
        #[arg(long, default_value_t = 8)]
        limit: usize,
        /// Synthesize with the language model when one is configured.
        #[arg(long)]
        synthesize: bool,
    },
    /// Print a deterministic search plan.
    Plan {
        #[command(flatten)]
        query: QueryArgs,
        /// quick, standard or deep
        #[arg(long, default_value = "standard")]
        depth: PlanDepth,
    },
    /// Show Evidence Index statistics.
    Stats,
    /// Delete every stored evidence record.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,research=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!(providers = ?config.providers(), "Configuration loaded");

    match cli.command {
        Commands::Search {
            query,
            max_results,
            recent,
            no_fetch,
            save,
        } => {
            let mut pipeline = ResearchPipeline::new(build_web(&config)?)
                .with_engine(build_engine(&config));
            if let Some(archive) = build_archive(&config) {
                pipeline = pipeline.with_archive(archive);
            }
            if save {
                pipeline = pipeline.with_index(Arc::new(open_index(&config).await?));
            }

            let request = ResearchRequest::new(&query.query)
                .with_years(query.from, query.to)
                .with_region(query.region)
                .with_max_results(max_results)
                .with_prefer_recent(recent)
                .with_fetch_content(!no_fetch);

            match pipeline.run(request).await {
                Ok(outcome) if cli.json => print_json(&outcome)?,
                Ok(outcome) => {
                    println!(
                        "{} retrieved {}, dropped off-topic {}, used {}",
                        "Evidence:".bold(),
                        outcome.stats.retrieved,
                        outcome.stats.dropped_off_topic,
                        outcome.stats.used
                    );
                    print_evidence(&outcome.evidence);
                    print_findings(&outcome.findings);
                }
                Err(ResearchError::NoEvidenceFound { guidance }) => {
                    eprintln!("{} {}", "No evidence found.".yellow().bold(), guidance);
                    std::process::exit(2);
                }
                Err(e) => return Err(e).context("Research failed"),
            }
        }

        Commands::Ingest { query, max_pages } => {
            let Some(archive) = build_archive(&config) else {
                bail!("TROVE_API_KEY must be set to ingest archive records");
            };
            let index = Arc::new(open_index(&config).await?);
            let orchestrator = BatchOrchestrator::new(archive, index.clone(), index);

            let mut request = JobRequest::new(&query.query)
                .with_years(query.from, query.to)
                .with_region(query.region);
            if let Some(max_pages) = max_pages {
                request = request.with_max_pages(max_pages);
            }

            let handle = orchestrator.submit(request).await.context("Failed to submit job")?;
            if !cli.json {
                println!("{} {}", "Submitted job".bold(), handle.id());
            }
            let job = handle.join().await?;
            print_job(&job, cli.json)?;
        }

        Commands::Job { id } => {
            let index = open_index(&config).await?;
            let job = index
                .get_job(id)
                .await?
                .with_context(|| format!("No job with id {id}"))?;
            print_job(&job, cli.json)?;
        }

        Commands::Jobs { limit } => {
            let index = open_index(&config).await?;
            let jobs = index.list_jobs(limit).await?;
            if cli.json {
                print_json(&jobs)?;
            } else if jobs.is_empty() {
                println!("No jobs yet.");
            } else {
                for job in &jobs {
                    print_job_line(job);
                }
            }
        }

        Commands::Report {
            job,
            query,
            from,
            to,
            region,
            limit,
            synthesize,
        } => {
            let index = Arc::new(open_index(&config).await?);
            let request = match (job, query) {
                (Some(id), _) => {
                    let job = index
                        .get_job(id)
                        .await?
                        .with_context(|| format!("No job with id {id}"))?;
                    ReportRequest::from(&job)
                }
                (None, Some(query)) => ReportRequest::new(query)
                    .with_years(from, to)
                    .with_region(region),
                (None, None) => bail!("Pass --job <ID> or --query <TEXT>"),
            };

            let mut builder = ReportBuilder::new(index).with_limit(limit);
            if synthesize {
                builder = builder.with_engine(build_engine(&config));
            }

            match builder.build(request).await {
                Ok(report) if cli.json => print_json(&report)?,
                Ok(report) => {
                    print_evidence(&report.evidence);
                    print_findings(&report.findings);
                }
                Err(ResearchError::NoEvidenceFound { guidance }) => {
                    eprintln!("{} {}", "No evidence found.".yellow().bold(), guidance);
                    std::process::exit(2);
                }
                Err(e) => return Err(e).context("Report failed"),
            }
        }

        Commands::Plan { query, depth } => {
            let window = match (query.from, query.to) {
                (Some(from), Some(to)) => Some((from, to)),
                (Some(year), None) | (None, Some(year)) => Some((year, year)),
                (None, None) => None,
            };
            let plan = build_search_plan(&query.query, query.region.as_deref(), window, depth);
            if cli.json {
                print_json(&plan)?;
            } else {
                for (i, step) in plan.iter().enumerate() {
                    println!(
                        "{}. [{:?}] {}\n   {}",
                        i + 1,
                        step.scope,
                        step.query.bold(),
                        step.rationale.dimmed()
                    );
                }
            }
        }

        Commands::Stats => {
            let index = open_index(&config).await?;
            let count = index.count().await?;
            let latest = index.list_jobs(1).await?.into_iter().next();
            if cli.json {
                print_json(&serde_json::json!({"records": count, "latestJob": latest}))?;
            } else {
                println!("{} records in {}", count, config.database_url);
                if let Some(job) = latest {
                    print!("Latest job: ");
                    print_job_line(&job);
                }
            }
        }

        Commands::Clear => {
            let index = open_index(&config).await?;
            let count = index.count().await?;
            index.clear().await?;
            println!("Deleted {count} evidence records.");
        }
    }

    Ok(())
}

async fn open_index(config: &Config) -> Result<SqliteEvidenceIndex> {
    SqliteEvidenceIndex::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open Evidence Index at {}", config.database_url))
}

fn build_archive(config: &Config) -> Option<ArchiveClient> {
    let key = config.trove_api_key.clone()?;
    Some(ArchiveClient::new(Arc::new(TroveArchive::new(key))))
}

fn build_web(config: &Config) -> Result<WebSearchAggregator> {
    let mut search_config = SearchConfig::default();
    if let Some(budget) = config.search_budget {
        search_config = search_config.with_time_budget(budget);
    }

    let mut providers: Vec<Arc<dyn WebSearcher>> = Vec::new();
    if let Some(key) = config.tavily_api_key.clone() {
        providers.push(Arc::new(TavilySearcher::new(key)));
    }
    if let Some(key) = config.brave_api_key.clone() {
        providers.push(Arc::new(BraveSearcher::new(key)));
    }
    if providers.is_empty() {
        tracing::warn!("No web search provider configured (TAVILY_API_KEY, BRAVE_API_KEY)");
    }

    let fetcher = HttpFetcher::new(search_config.fetch_timeout).context("Failed to build HTTP client")?;
    Ok(WebSearchAggregator::new(providers)
        .with_fetcher(Arc::new(fetcher))
        .with_cache(Arc::new(HitCache::from_config(&CacheConfig::default())))
        .with_config(search_config))
}

fn build_engine(config: &Config) -> SynthesisEngine {
    let model = config.openai_api_key.clone().map(|key| {
        let model = OpenAiModel::new(key);
        let model = match &config.openai_model {
            Some(name) => model.with_model(name),
            None => model,
        };
        Arc::new(model) as Arc<dyn LanguageModel>
    });
    if model.is_none() {
        tracing::info!("OPENAI_API_KEY not set, findings will be extractive");
    }
    SynthesisEngine::new(model)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_job(job: &Job, json: bool) -> Result<()> {
    if json {
        return print_json(job);
    }
    print_job_line(job);
    if let Some(error) = &job.error {
        println!("  {} {}", "error:".red(), error);
    }
    Ok(())
}

fn print_job_line(job: &Job) {
    let status = match job.status.as_str() {
        "done" => job.status.as_str().green(),
        "error" => job.status.as_str().red(),
        other => other.yellow(),
    };
    println!(
        "{} {:>7} {:>3}%  {}  ({})",
        job.id,
        status,
        job.progress_pct,
        job.query,
        job.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_evidence(evidence: &[EvidenceRecord]) {
    for record in evidence {
        let year = record.year.map(|y| y.to_string()).unwrap_or_else(|| "----".to_string());
        println!(
            "  {:.2}  {}  {}  {}",
            record.relevance_score,
            year,
            record.title.bold(),
            record.url.dimmed()
        );
    }
    println!();
}

fn print_findings(findings: &Findings) {
    println!("{}", "Overview".bold().underline());
    println!("{}\n", findings.overview);

    if !findings.key_points.is_empty() {
        println!("{}", "Key findings".bold().underline());
        for point in &findings.key_points {
            println!(
                "- {} ({:.0}%) [{}]",
                point.title.bold(),
                point.confidence * 100.0,
                point.citations.join(", ")
            );
            println!("  {}", point.insight);
            for quote in &point.evidence {
                println!("  > {}", quote.italic());
            }
        }
        println!();
    }

    if !findings.timeline.is_empty() {
        println!("{}", "Timeline".bold().underline());
        for entry in &findings.timeline {
            println!("  {}  {} [{}]", entry.date, entry.event, entry.citations.join(", "));
        }
        println!();
    }

    for (heading, items) in [("Limitations", &findings.limitations), ("Next questions", &findings.next_questions)] {
        if !items.is_empty() {
            println!("{}", heading.bold().underline());
            for item in items {
                println!("- {item}");
            }
            println!();
        }
    }

    println!("{} {:?}", "Mode:".dimmed(), findings.mode);
}
