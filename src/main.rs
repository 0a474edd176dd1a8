//! Directory-Harvester main entry point
//!
//! This is the command-line interface for the business-directory crawler.

use anyhow::Context;
use clap::Parser;
use directory_harvester::config::{compute_config_hash, parse_config, validate, Config};
use directory_harvester::crawler::Coordinator;
use directory_harvester::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Directory-Harvester: a polite business-directory crawler
///
/// Walks the listing pages of a company directory, follows each listing to
/// its profile page, records every company website to links.json and
/// harvests contact emails from those websites into emails.csv.
#[derive(Parser, Debug)]
#[command(name = "directory-harvester")]
#[command(version)]
#[command(about = "A polite business-directory crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// First listing page to visit
    #[arg(long, value_name = "N")]
    first_page: Option<u32>,

    /// Last listing page to visit (inclusive)
    #[arg(long, value_name = "N")]
    last_page: Option<u32>,

    /// Where to write the company URLs (JSON array)
    #[arg(long, value_name = "PATH")]
    links_out: Option<String>,

    /// Where to write the emails (CSV)
    #[arg(long, value_name = "PATH")]
    emails_out: Option<String>,

    /// Stop dispatching new requests after this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    run_timeout_secs: Option<u64>,

    /// Skip crawling; extract emails from an existing links file
    #[arg(long, conflicts_with = "dry_run")]
    emails_only: bool,

    /// Validate config and show what would be crawled without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let coordinator = Coordinator::new(config).context("Failed to initialise harvester")?;

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            cancel.cancel();
        }
    });

    let outcome = if cli.emails_only {
        coordinator.run_emails_only().await
    } else {
        coordinator.run().await
    }
    .context("Harvest failed")?;

    if !cli.quiet {
        print_summary(&outcome.summary);
    }

    outcome
        .into_result()
        .context("Harvest finished but results could not be saved")?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("directory_harvester=info,warn"),
            1 => EnvFilter::new("directory_harvester=debug,info"),
            2 => EnvFilter::new("directory_harvester=trace,debug"),
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

/// Loads the config file (or defaults), applies CLI overrides, then validates
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = parse_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using built-in defaults");
            Config::default()
        }
    };

    if let Some(first) = cli.first_page {
        config.site.first_page = first;
    }
    if let Some(last) = cli.last_page {
        config.site.last_page = last;
    }
    if let Some(path) = &cli.links_out {
        config.output.links_path = path.clone();
    }
    if let Some(path) = &cli.emails_out {
        config.output.emails_path = path.clone();
    }
    if let Some(secs) = cli.run_timeout_secs {
        config.run.timeout_secs = secs;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: prints the crawl plan
fn handle_dry_run(config: &Config) {
    println!("=== Directory-Harvester Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!(
        "  Listing pages: {}..={} ({} pages)",
        config.site.first_page,
        config.site.last_page,
        config.site.page_count()
    );
    println!("  Allowed domains: {}", config.site.allowed_domains.join(", "));

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!("  Request timeout: {}ms", config.fetcher.request_timeout_ms);
    println!("  Max attempts: {}", config.fetcher.max_attempts);

    for (name, rate) in [
        ("Listing", &config.listing.rate),
        ("Profile", &config.profile.rate),
        ("Extraction", &config.extraction.rate),
    ] {
        println!(
            "\n{} pool: {} per domain, {}ms delay + up to {}ms jitter",
            name, rate.concurrency, rate.delay_ms, rate.jitter_ms
        );
    }

    println!("\nEmail filter rejects: {}", config.extraction.reject_substrings.join(", "));

    println!("\nOutput:");
    println!("  Links: {}", config.output.links_path);
    println!("  Emails: {}", config.output.emails_path);
    if config.run.timeout_secs > 0 {
        println!("  Run timeout: {}s", config.run.timeout_secs);
    }

    println!("\n✓ Configuration is valid");
}
