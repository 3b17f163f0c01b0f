//! Procurement Notice Scraper CLI
//!
//! Resolves a run configuration from a JSON file, environment and flags,
//! then drives one scrape → merge → clean → report run in Chromium.
//! Ctrl-C stops new work; in-flight pages finish first.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use notice_scraper::browser::chromium::ChromiumEngine;
use notice_scraper::{Catalog, Orchestrator, RunConfig, RunResults};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,notice_scraper=debug";

#[derive(Parser)]
#[command(name = "notice-scraper")]
#[command(about = "Scrape procurement notices by category into merged CSV")]
struct Cli {
    /// Category IDs or names, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// JSON run configuration (also NOTICE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Max notices per category, 0 for all
    #[arg(long)]
    limit: Option<usize>,

    /// Seconds to wait after each detail page
    #[arg(long)]
    delay: Option<f64>,

    /// Retries per category when nothing was collected
    #[arg(long)]
    retry_count: Option<u32>,

    /// Categories scraped at once
    #[arg(long)]
    category_workers: Option<usize>,

    /// Detail pages fetched at once within a category
    #[arg(long)]
    detail_workers: Option<usize>,

    /// Output root (also NOTICE_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip the clean pass
    #[arg(long)]
    no_clean: bool,

    /// Fetch failed detail pages over plain HTTP
    #[arg(long)]
    http_fallback: bool,

    /// Chrome/Chromium binary to launch
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Show browser windows
    #[arg(long)]
    headful: bool,

    /// Print the category catalog and exit
    #[arg(long)]
    list_categories: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.log_file.as_ref())?;

    if cli.list_categories {
        for category in Catalog::builtin().all() {
            println!("{:>4}  {}", category.id, category.name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = resolve_config(&cli)?;
    config.validate().context("Invalid run configuration")?;

    let mut engine = ChromiumEngine::new().with_head(cli.headful);
    if let Some(chrome) = &cli.chrome {
        engine = engine.with_executable(chrome);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stop requested; finishing in-flight pages");
            on_signal.cancel();
        }
    });

    let orchestrator =
        Orchestrator::new(Arc::new(engine), config).with_cancellation(cancel);
    let results = orchestrator.run().await.context("Scraping run failed")?;

    print_summary(&results);
    Ok(if results.any_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Config file, then environment, then flags; later sources win.
fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("NOTICE_CONFIG").map(PathBuf::from));
    let mut config = match &config_path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RunConfig::default(),
    };

    if let Some(dir) = std::env::var_os("NOTICE_OUTPUT_DIR") {
        config = config.with_output_dir(PathBuf::from(dir));
    }

    if !cli.categories.is_empty() {
        config = config.with_categories(cli.categories.iter().cloned());
    }
    if let Some(limit) = cli.limit {
        config = config.with_limit(limit);
    }
    if let Some(delay) = cli.delay {
        config = config.with_delay(delay);
    }
    if let Some(retries) = cli.retry_count {
        config = config.with_retry_count(retries);
    }
    if let Some(workers) = cli.category_workers {
        config = config.with_category_workers(workers);
    }
    if let Some(workers) = cli.detail_workers {
        config = config.with_detail_workers(workers);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    if cli.no_clean {
        config = config.with_no_clean(true);
    }
    if cli.http_fallback {
        config = config.with_http_fallback(true);
    }
    Ok(config)
}

fn init_logging(level: Option<&str>, log_file: Option<&PathBuf>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {level}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(file_layer)
        .init();
    Ok(())
}

fn print_summary(results: &RunResults) {
    println!();
    println!("Categories succeeded : {}", results.successful.len());
    println!("Categories failed    : {}", results.failed.len());
    for (id, reason) in &results.failed {
        println!("  {id}: {reason}");
    }
    println!("Total entries        : {}", results.total_entries);
    println!("Merged entries       : {}", results.merged_entries);
    println!("Duplicates removed   : {}", results.duplicates_removed);
    if let Some(path) = &results.final_output {
        println!("Final output         : {}", path.display());
    }
    if let Some(reason) = &results.merge_error {
        println!("Merge failed         : {reason}");
    }
    if let Some(path) = &results.report {
        println!("Report               : {}", path.display());
    }
    if results.cancelled {
        println!("Run was cancelled before completion");
    }
}
