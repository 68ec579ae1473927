//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest crawler.

use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{load_config_catalog, Coordinator};
use catalog_harvest::ledger::{export_json, import_legacy, Ledger, SqliteLedger};
use catalog_harvest::output::{
    load_statistics, print_plan, print_run_summary, print_statistics, write_run_summary,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resumable catalog crawler
///
/// Catalog-Harvest works through every item URL of a categorized catalog,
/// extracts course details from each page and stores them as sharded JSON.
/// Interrupted runs pick up where they stopped.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_ledger", "import_ledger"])]
    dry_run: bool,

    /// Show statistics from the ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_ledger", "import_ledger"])]
    stats: bool,

    /// Write the ledger as JSON to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats", "import_ledger"])]
    export_ledger: Option<PathBuf>,

    /// Load a legacy JSON ledger from PATH into the ledger and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats", "export_ledger"])]
    import_ledger: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_ledger {
        handle_export_ledger(&config, path)?;
    } else if let Some(path) = &cli.import_ledger {
        handle_import_ledger(&config, path)?;
    } else {
        handle_harvest(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_ledger(config: &Config) -> Result<SqliteLedger, Box<dyn std::error::Error>> {
    Ok(SqliteLedger::open(Path::new(&config.output.ledger_path))?)
}

/// Handles the --dry-run mode: plans the harvest and prints it
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency limit: {}", config.crawler.concurrency_limit);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Shard size: {}", config.crawler.shard_size);
    println!(
        "  Jitter: {}-{}ms",
        config.crawler.jitter_min_ms, config.crawler.jitter_max_ms
    );
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nInput:");
    println!("  Catalog: {}", config.input.catalog_dir);

    println!("\nOutput:");
    println!("  Shards: {}", config.output.shard_dir);
    println!("  Ledger: {}", config.output.ledger_path);
    println!();

    let catalog = load_config_catalog(config)?;
    let coordinator = Coordinator::for_planning(config)?;
    let plan = coordinator.plan(&catalog)?;
    print_plan(&plan);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would fetch up to {} URLs across {} pairs",
        plan.total_pending(),
        plan.pairs.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Ledger: {}\n", config.output.ledger_path);

    let ledger = open_ledger(config)?;
    let stats = load_statistics(&ledger)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-ledger mode
fn handle_export_ledger(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config)?;

    tracing::info!("Exporting ledger to {}", path.display());
    let written = export_json(&ledger, path)?;

    println!("✓ Exported {} ledger entries to: {}", written, path.display());
    Ok(())
}

/// Handles the --import-ledger mode
fn handle_import_ledger(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config)?;

    tracing::info!("Importing legacy ledger from {}", path.display());
    let imported = import_legacy(&ledger, path)?;

    println!("✓ Imported {} ledger entries from: {}", imported, path.display());
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();

    // Ctrl-C stops dispatching; in-flight URLs finish and are recorded
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight URLs");
            signal_token.cancel();
        }
    });

    let catalog = load_config_catalog(config)?;
    let coordinator = Coordinator::from_config(config)?;

    match coordinator.ledger().start_run(config_hash)? {
        Some(previous) if previous != config_hash => {
            tracing::warn!(
                "Configuration changed since the last run (was {})",
                previous
            );
        }
        _ => {}
    }

    let summary = match coordinator.run(&catalog, &cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    if let Some(path) = &config.output.summary_path {
        write_run_summary(&summary, config_hash, Path::new(path))?;
        tracing::info!("Summary written to {}", path);
    }
    print_run_summary(&summary, config_hash);

    if summary.cancelled {
        tracing::info!("Harvest interrupted; run again to resume");
    } else {
        tracing::info!("Harvest completed successfully");
    }

    Ok(())
}
