use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jme_storage::{JobStore, MemoryJobStore, PgJobStore};
use jme_sync::backfill::{
    backfill_enrichments, backfill_missing_hashes, hash_diagnostics, merge_duplicate_urls,
    DEFAULT_BATCH_SIZE,
};
use jme_sync::skills::{evaluate, parse_eval_samples, validate_dictionary};
use jme_sync::{load_dictionary, load_matcher, seed_skills, IngestSummary, SyncConfig, SyncPipeline};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "jme-cli")]
#[command(about = "Job market explorer ingestion CLI")]
struct Cli {
    /// Run against an in-memory store seeded from the skill dictionary.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest one source, e.g. `greenhouse:acme` or `seed:data/jobs.json`.
    Ingest {
        #[arg(long)]
        source: String,
        /// Freshness window in days; defaults to JME_DAYS.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Ingest every enabled source in the registry once.
    Nightly,
    /// Run nightly ingestion on the configured cron expression until Ctrl-C.
    Schedule,
    SeedSkills {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    ValidateSkills {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Precision/recall of the matcher against a JSONL file of `{text, labels}`.
    EvalSkills {
        #[arg(long)]
        samples: PathBuf,
    },
    BackfillHashes {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: i64,
        /// Afterwards delete older rows sharing a canonical URL, keeping the newest.
        #[arg(long)]
        merge_duplicates: bool,
    },
    /// Fill missing seniority and annual USD salary on existing rows.
    BackfillEnrichments {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: i64,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    if let Commands::ValidateSkills { path } = &cli.command {
        return validate_skills(path.clone().unwrap_or_else(|| config.skills_path.clone())).await;
    }

    if cli.dry_run {
        let store = MemoryJobStore::new();
        match load_dictionary(&config.skills_path).await {
            Ok(entries) => {
                seed_skills(&store, &entries).await?;
            }
            Err(err) => warn!(error = %err, "dry run without a skill dictionary"),
        }
        info!("dry run: using in-memory store");
        run(cli.command, config, store).await
    } else {
        let store = PgJobStore::connect(&config.database_url, config.db_max_connections)
            .await
            .context("connecting to DATABASE_URL")?;
        run(cli.command, config, store).await
    }
}

async fn run<S: JobStore + 'static>(command: Commands, config: SyncConfig, store: S) -> Result<()> {
    let pipeline = Arc::new(SyncPipeline::new(config, store)?);

    match command {
        Commands::Ingest { source, days } => {
            let registry = pipeline.load_registry().await.unwrap_or_else(|err| {
                warn!(error = %err, "no source registry, html sources are disabled");
                jme_sync::SourceRegistry { sources: Vec::new() }
            });
            let days = days.unwrap_or(pipeline.config().days);
            let summary = pipeline
                .run_source(&source, days, &registry.html_allow_list())
                .await?;
            print_summary(&summary);
        }
        Commands::Nightly => {
            for summary in pipeline.run_nightly().await? {
                print_summary(&summary);
            }
        }
        Commands::Schedule => {
            let Some(mut sched) = pipeline.maybe_build_scheduler().await? else {
                bail!("scheduler is disabled; set JME_SCHEDULER_ENABLED=true to run on a cron");
            };
            sched.start().await.context("starting scheduler")?;
            info!(cron = %pipeline.config().nightly_cron, "scheduler running, Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::SeedSkills { path } => {
            let path = path.unwrap_or_else(|| pipeline.config().skills_path.clone());
            let entries = load_dictionary(&path).await?;
            let report = seed_skills(pipeline.store(), &entries).await?;
            println!("skills seeded: inserted={} updated={}", report.inserted, report.updated);
        }
        Commands::ValidateSkills { path } => {
            let path = path.unwrap_or_else(|| pipeline.config().skills_path.clone());
            validate_skills(path).await?;
        }
        Commands::EvalSkills { samples } => {
            let body = tokio::fs::read_to_string(&samples)
                .await
                .with_context(|| format!("reading {}", samples.display()))?;
            let samples = parse_eval_samples(&body).context("parsing eval samples")?;
            let matcher = load_matcher(pipeline.store()).await?;
            let report = evaluate(&matcher, &samples);
            println!(
                "eval: samples={} tp={} fp={} fn={} precision={:.3} recall={:.3}",
                report.samples,
                report.true_positives,
                report.false_positives,
                report.false_negatives,
                report.precision(),
                report.recall()
            );
        }
        Commands::BackfillHashes {
            batch_size,
            merge_duplicates,
        } => {
            let summary = backfill_missing_hashes(pipeline.store(), batch_size).await?;
            println!(
                "backfill complete: batches={} scanned={} updated={} url_hash_conflicts={}",
                summary.batches, summary.scanned, summary.updated, summary.url_hash_conflicts
            );
            if merge_duplicates {
                let merged = merge_duplicate_urls(pipeline.store(), batch_size).await?;
                println!(
                    "merge complete: scanned={} groups={} deleted={} rehashed={}",
                    merged.scanned, merged.groups, merged.deleted, merged.rehashed
                );
            }
            let diagnostics = hash_diagnostics(pipeline.store(), batch_size).await?;
            println!(
                "remaining: missing_url_hash={} duplicate_url_groups={}",
                diagnostics.missing_url_hash, diagnostics.duplicate_groups
            );
        }
        Commands::BackfillEnrichments { batch_size } => {
            let summary = backfill_enrichments(pipeline.store(), batch_size).await?;
            println!(
                "enrichment backfill complete: batches={} scanned={} updated={}",
                summary.batches, summary.scanned, summary.updated
            );
        }
    }

    Ok(())
}

async fn validate_skills(path: PathBuf) -> Result<()> {
    let entries = load_dictionary(&path).await?;
    let report = validate_dictionary(&entries);
    for issue in &report.issues {
        eprintln!("{issue}");
    }
    println!(
        "dictionary {}: skills={} phrases={} issues={}",
        path.display(),
        report.skills,
        report.phrases,
        report.issues.len()
    );
    if !report.is_valid() {
        bail!("skill dictionary has {} issue(s)", report.issues.len());
    }
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "ingest complete: run_id={} source={} fetched={} stale={} added={} skipped={} failed={}",
        summary.run_id,
        summary.source,
        summary.fetched,
        summary.stale,
        summary.added,
        summary.skipped,
        summary.failed
    );
}
