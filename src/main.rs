//! inpres-harvest main entry point
//!
//! This is the command-line interface for the INPRES seismic event harvester.

use chrono::Local;
use clap::Parser;
use inpres_harvest::config::{load_config_with_hash, Config};
use inpres_harvest::crawler::{crawl, format_user_agent, parse_window_date, plan_window, QueryWindow};
use inpres_harvest::output::{load_statistics, print_report, print_statistics};
use inpres_harvest::storage::open_store;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// inpres-harvest: incremental collector of INPRES seismic events
///
/// Each run searches the catalogue from the day of the newest stored event
/// up to today, walks every result page and merges the events into the
/// configured output.
#[derive(Parser, Debug)]
#[command(name = "inpres-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Incremental harvester for the INPRES earthquake catalogue", long_about = None)]
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

    /// Validate config and show the query window without contacting the site
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the stored events and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

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

    if cli.dry_run {
        handle_dry_run(&config, &config_hash)?;
    } else if cli.stats {
        handle_stats(&config, &config_hash)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("inpres_harvest=info,warn"),
            1 => EnvFilter::new("inpres_harvest=debug,info"),
            2 => EnvFilter::new("inpres_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the planned search
fn handle_dry_run(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== inpres-harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Search page: {}", config.site.search_path);
    println!(
        "  Form fields: {} / {} / {}={}",
        config.site.date_from_field,
        config.site.date_to_field,
        config.site.flag_field,
        config.site.flag_value
    );
    println!("  Row selector: {}", config.site.row_selector);
    println!("  Pagination selector: {}", config.site.pagination_selector);

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent pages: {}",
        config.crawler.max_concurrent_pages
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Retries: {} (every {}ms)",
        config.crawler.max_retries, config.crawler.retry_delay_ms
    );

    println!("\nUser Agent: {}", format_user_agent(&config.user_agent));

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Path: {}", config.output.path.display());
    if let Some(package) = &config.output.package {
        println!("  Data package: {}", package.name);
    }

    let window = planned_window(config, config_hash)?;
    println!("\n✓ Configuration is valid");
    println!("✓ Would search for events in {}", window);

    Ok(())
}

/// Plans the window without creating an output that does not exist yet
fn planned_window(
    config: &Config,
    config_hash: &str,
) -> Result<QueryWindow, Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let epoch = parse_window_date(&config.site.epoch)
        .ok_or_else(|| format!("invalid epoch '{}'", config.site.epoch))?;

    if !config.output.path.exists() {
        return Ok(QueryWindow::new(epoch, today));
    }

    let store = open_store(&config.output, config_hash)?;
    Ok(plan_window(store.as_ref(), epoch, today))
}

/// Handles the --stats mode: shows statistics of the stored events
fn handle_stats(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Output: {}\n", config.output.path.display());

    let store = open_store(&config.output, config_hash)?;
    let stats = load_statistics(store.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Harvesting {} into {}",
        config.site.base_url,
        config.output.path.display()
    );

    let mut store = open_store(&config.output, config_hash)?;

    match crawl(config, store.as_mut()).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
