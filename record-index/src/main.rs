use std::env;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use record_index::{Dependencies, IndexingError};
use record_index_pipeline::reindex::DEFAULT_BASE_TYPE;
use record_index_pipeline::{ReindexItemsOptions, ReindexOptions, SearchService};
use record_index_shared::{SearchQuery, Stage};

#[derive(Parser)]
#[command(name = "record-index")]
#[command(about = "Keeps the record search index in sync with the record store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Define the index and its mappings
    Define {
        /// Delete the index before defining it again
        #[arg(long)]
        rebuild: bool,

        /// Re-index every record once the index is defined
        #[arg(long)]
        reindex: bool,
    },
    /// Re-index specific records
    ReindexItems {
        /// Comma separated record ids
        #[arg(long)]
        ids: String,

        /// Also re-index the records' descendants
        #[arg(long)]
        recurse: bool,

        /// Type the ids belong to
        #[arg(long, default_value = DEFAULT_BASE_TYPE)]
        base: String,
    },
    /// Run a search and print the matching records
    Search {
        query: String,

        /// Only return records at this stage
        #[arg(long)]
        stage: Option<Stage>,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Check that the search cluster is reachable
    Health,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> Result<(), IndexingError> {
    let dependencies = Dependencies::new().await?;
    let service = dependencies.service;
    let progress = |line: &str| println!("{line}");

    match cli.command {
        Commands::Define { rebuild, reindex } => {
            info!(rebuild, reindex, "Starting index definition");
            let options = ReindexOptions { rebuild, reindex };
            service.task().run(options, Some(&progress)).await?;
        }
        Commands::ReindexItems { ids, recurse, base } => {
            let options = ReindexItemsOptions {
                ids: ReindexItemsOptions::parse_ids(&ids),
                recursive: recurse,
                base_type: base,
            };
            info!(ids = ?options.ids, recursive = recurse, "Starting item reindex");
            service.task().run_items(&options, Some(&progress)).await?;
        }
        Commands::Search {
            query,
            stage,
            limit,
        } => search(&service, query, stage, limit).await?,
        Commands::Health => {
            let healthy = service.health_check().await?;
            println!("{}", if healthy { "healthy" } else { "unhealthy" });
        }
    }

    Ok(())
}

async fn search(
    service: &SearchService,
    query: String,
    stage: Option<Stage>,
    limit: usize,
) -> Result<(), IndexingError> {
    let mut query = SearchQuery::text(query).with_page(limit, 0);
    if let Some(stage) = stage {
        query = query.in_stage(stage);
    }

    let results = service.search(query);
    let records = results.to_records(true).await?;

    println!(
        "{} of {} hits ({} ms)",
        records.len(),
        results.total_hits().await?,
        results.took_ms().await?
    );
    for result in records {
        println!(
            "{} #{} [{}] {} ({:.2})",
            result.record.record_type(),
            result.record.id(),
            result.stage,
            result.record.title(),
            result.score.unwrap_or_default()
        );
    }

    if let Some(aggregations) = results.aggregations().await? {
        println!("{}", serde_json::to_string_pretty(aggregations).unwrap_or_default());
    }

    Ok(())
}
