//! Poi-Sweep main entry point
//!
//! This is the command-line interface for the Poi-Sweep grid crawler.

use anyhow::Context;
use clap::Parser;
use poi_sweep::config::{load_config_with_hash, Config};
use poi_sweep::crawler::{run_crawl, RateLimiter};
use poi_sweep::SweepError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Poi-Sweep: a resumable grid crawler for points of interest
///
/// Poi-Sweep splits an administrative region into a grid, searches every
/// cell for every category through a rate-limited place-search API, writes
/// the results in batches, and checkpoints so an interrupted crawl resumes
/// where it stopped.
#[derive(Parser, Debug)]
#[command(name = "poi-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A resumable grid crawler for points of interest", long_about = None)]
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

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, discarding any checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without any request
    #[arg(long, conflicts_with_all = ["stats", "to_wgs84", "merge"])]
    dry_run: bool,

    /// Show the stored checkpoint and run history and exit
    #[arg(long, conflicts_with_all = ["dry_run", "to_wgs84", "merge"])]
    stats: bool,

    /// Convert the output directory to WGS84 into DIR and exit
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats", "merge"])]
    to_wgs84: Option<PathBuf>,

    /// Merge the output directory into one GeoJSON FILE and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "stats", "to_wgs84"])]
    merge: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.resume {
        config.crawl.resume = true;
    }

    if cli.dry_run {
        handle_dry_run(&config).await;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(out_dir) = cli.to_wgs84 {
        handle_to_wgs84(&config, &out_dir)?;
    } else if let Some(out_file) = cli.merge {
        handle_merge(&config, &out_file)?;
    } else {
        handle_crawl(&config, &config_hash, cli.fresh).await?;
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
            0 => EnvFilter::new("poi_sweep=info,warn"),
            1 => EnvFilter::new("poi_sweep=debug,info"),
            2 => EnvFilter::new("poi_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
async fn handle_dry_run(config: &Config) {
    println!("=== Poi-Sweep Dry Run ===\n");

    println!("Crawl '{}':", config.crawl.name);
    println!("  Region: {}", config.crawl.region);
    println!(
        "  Grid: {} rows x {} cols = {} cells",
        config.crawl.rows,
        config.crawl.cols,
        config.crawl.rows as u64 * config.crawl.cols as u64
    );
    match &config.crawl.bbox {
        Some(b) => println!(
            "  Bounding box: lng {}..{}, lat {}..{}",
            b.min_lng, b.max_lng, b.min_lat, b.max_lat
        ),
        None => println!("  Bounding box: resolved from region boundary at start"),
    }
    println!("  Page size: {}", config.crawl.page_size);
    println!("  Flush threshold: {}", config.crawl.flush_threshold);
    println!(
        "  Checkpoint: {} (every {} pages)",
        config.checkpoint_path().display(),
        config.crawl.checkpoint_every
    );

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Timeout: {}s", config.api.timeout_secs);

    println!("\nRate Limits (checked in this order):");
    let limiter = RateLimiter::from_config(&config.rate_limits);
    for (limit, window) in limiter.describe().await {
        println!("  - {} requests / {}s", limit, window.as_secs());
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Fields: {}", config.output.fields.join(", "));

    println!("\nCategories ({}):", config.categories.len());
    for category in &config.categories {
        println!("  - {} ({})", category.name, category.code);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ At least {} requests per full crawl",
        config.crawl.rows as u64 * config.crawl.cols as u64 * config.categories.len() as u64
    );
}

/// Handles the --stats mode: shows the stored checkpoint and runs
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use poi_sweep::output::{load_statistics, print_statistics};
    use poi_sweep::storage::open_storage;

    let path = config.checkpoint_path();
    println!("Database: {}\n", path.display());

    let store = open_storage(&path)
        .with_context(|| format!("Failed to open checkpoint database {}", path.display()))?;
    let stats = load_statistics(&store, &config.crawl.name)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --to-wgs84 mode
fn handle_to_wgs84(config: &Config, out_dir: &std::path::Path) -> anyhow::Result<()> {
    let in_dir = &config.output.directory;
    let report = poi_sweep::postprocess::convert_directory(in_dir, out_dir)
        .with_context(|| format!("Failed to convert {}", in_dir.display()))?;

    println!(
        "✓ Converted {} files, copied {} files into {}",
        report.converted,
        report.copied,
        out_dir.display()
    );
    if !report.failed.is_empty() {
        anyhow::bail!("{} files could not be converted", report.failed.len());
    }
    Ok(())
}

/// Handles the --merge mode
fn handle_merge(config: &Config, out_file: &std::path::Path) -> anyhow::Result<()> {
    let in_dir = &config.output.directory;
    let count = poi_sweep::postprocess::merge_directory(in_dir, out_file)
        .with_context(|| format!("Failed to merge {}", in_dir.display()))?;

    println!("✓ Merged {} features into {}", count, out_file.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding previous checkpoint)");
    } else {
        tracing::info!("Starting crawl (will resume from checkpoint if one exists)");
    }

    tracing::info!(
        "Region: {}, grid: {}x{}, categories: {}",
        config.crawl.region,
        config.crawl.rows,
        config.crawl.cols,
        config.categories.len()
    );

    match run_crawl(config, config_hash, fresh).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed successfully: {} records in {} files",
                report.record_count,
                report.file_count
            );
            Ok(())
        }
        Err(SweepError::Interrupted) => {
            tracing::warn!("Crawl interrupted; run again to resume");
            std::process::exit(130);
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
