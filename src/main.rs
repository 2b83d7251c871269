use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cairn_importer::{
    run_import_pipeline, HttpStore, ImportConfig, ImportProgress, MemoryStore, PipelineOptions,
    PipelineRunResult, ThingStore,
};

#[derive(Parser)]
#[command(name = "cairn-import")]
#[command(about = "Import external data sources into a Cairn document store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the configured import mappings
    Run {
        /// Import configuration file
        #[arg(short, long, default_value = "import.yaml")]
        config: PathBuf,

        /// Run only the named mapping (repeatable)
        #[arg(long = "mapping", value_name = "ID")]
        mappings: Vec<String>,

        /// Classify every record without writing to the store
        #[arg(long)]
        dry_run: bool,

        /// Treat already-present documents as final
        #[arg(long)]
        skip_existing: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Store URL, overriding the configuration file
        #[arg(long, value_name = "URL")]
        target: Option<String>,

        /// Use an in-process store instead of a server (useful with --dry-run)
        #[arg(long)]
        offline: bool,

        /// Disable the progress display
        #[arg(long)]
        no_progress: bool,
    },
    /// List the mappings defined in the configuration file
    List {
        /// Import configuration file
        #[arg(short, long, default_value = "import.yaml")]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .init();
}

fn build_store(
    config: &ImportConfig,
    target: Option<String>,
    offline: bool,
) -> anyhow::Result<Arc<dyn ThingStore>> {
    if offline {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = target
        .or_else(|| config.store.url.clone())
        .ok_or_else(|| anyhow::anyhow!("no store URL configured; set store.url or pass --target"))?;
    let parsed = url::Url::parse(&url)?;
    let store = HttpStore::new(parsed)?.with_token(config.store.token.clone());
    Ok(Arc::new(store))
}

fn print_report(run: &PipelineRunResult) {
    println!();
    println!("Import report:");
    for result in &run.results {
        println!(
            "  {:<24} {:<16} {:>9?}  processed={} created={} updated={} skipped={} errors={} ({:.1}s)",
            result.mapping_id,
            result.collection,
            result.state,
            result.processed,
            result.created,
            result.updated,
            result.skipped,
            result.errors,
            result.duration.as_secs_f64(),
        );
        for detail in &result.error_details {
            println!("      ! {}", detail);
        }
        if result.errors as usize > result.error_details.len() {
            println!(
                "      ... and {} more errors",
                result.errors as usize - result.error_details.len()
            );
        }
    }
    println!();
    println!(
        "Totals: processed={} created={} updated={} skipped={} errors={} in {:.1}s",
        run.total_processed,
        run.total_created,
        run.total_updated,
        run.total_skipped,
        run.total_errors,
        run.duration.as_secs_f64(),
    );
    if run.cancelled {
        println!("Run was cancelled before completion.");
    }
    println!("Success: {}", run.success);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            mappings,
            dry_run,
            skip_existing,
            verbose,
            target,
            offline,
            no_progress,
        } => {
            init_tracing(verbose);

            let config = ImportConfig::load(&config)?;
            let mapping_set = config.mapping_set()?;
            let store = build_store(&config, target, offline)?;

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight work");
                    signal_cancel.cancel();
                }
            });

            let progress = if no_progress {
                None
            } else {
                Some(Arc::new(ImportProgress::new()))
            };

            let mut options = PipelineOptions::from_settings(&config.settings);
            options.dry_run = dry_run;
            options.skip_existing = skip_existing;
            options.cancel = cancel;
            options.progress = progress.clone();
            if !mappings.is_empty() {
                options.mapping_filter = Some(mappings);
            }

            let run = run_import_pipeline(&mapping_set, store, options).await?;

            if let Some(progress) = progress {
                progress.finish();
            }
            print_report(&run);

            if !run.success {
                std::process::exit(1);
            }
        }
        Commands::List { config } => {
            let config = ImportConfig::load(&config)?;
            println!("Configured mappings:");
            for mapping in &config.mappings {
                println!(
                    "  {:<24} collection={:<16} source={:<6} skip_existing={} dry_run={}",
                    mapping.id,
                    mapping.collection,
                    mapping.source.kind(),
                    mapping.policy.skip_existing,
                    mapping.policy.dry_run,
                );
            }
        }
    }

    Ok(())
}
