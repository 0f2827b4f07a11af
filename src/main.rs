//! Obsidian autolink CLI - main entry point
//!
//! Scans the configured vault and ingests it into Neo4j batch by batch.

use std::net::SocketAddr;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use obsidian_autolink::ingest::{self, FailurePolicy, IngestOptions};
use obsidian_autolink::{metrics, Config, Neo4jGraphBuilder};

#[derive(Parser)]
#[command(name = "obsidian_autolink")]
#[command(about = "Build a Neo4j knowledge graph from an Obsidian vault", long_about = None)]
#[command(version)]
struct Cli {
    /// Files per batch (overrides BATCH_SIZE)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Stop at the first failed batch instead of continuing
    #[arg(long, default_value_t = false)]
    fail_fast: bool,

    /// Maximum batches processed at the same time
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("obsidian_autolink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = Config::from_env_with_batch_size(cli.batch_size)?;

    let options = IngestOptions {
        failure_policy: if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        },
        concurrency: cli.concurrency,
    };

    let builder = Neo4jGraphBuilder::connect(&config).await?;
    let summary = ingest::run(&config, &builder, options).await?;

    println!("\n=== Ingestion summary ===");
    println!("Files:    {}", summary.total_files);
    println!(
        "Batches:  {}/{} succeeded",
        summary.succeeded, summary.total_batches
    );
    println!(
        "Written:  {} notes ({} skipped), {} chunks, {} entities, {} relationships",
        summary.report.notes,
        summary.report.skipped_notes,
        summary.report.chunks,
        summary.report.entities,
        summary.report.relationships
    );

    match builder.store().stats().await {
        Ok(stats) => println!("\n=== Graph ===\n{}", stats),
        Err(err) => warn!("Could not read graph stats: {}", err),
    }

    if !summary.is_success() {
        for failure in &summary.failures {
            error!("{}", failure.error);
        }
        anyhow::bail!(
            "{} of {} batches failed: {:?}",
            summary.failures.len(),
            summary.total_batches,
            summary.failed_batches()
        );
    }

    Ok(())
}
