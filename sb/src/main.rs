//! SortBus - parallel quicksort over a bounded message bus
//!
//! CLI entry point: generate random doubles, sort them, verify, report.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{info, warn};

use sortbus::cli::{Cli, Command, OutputFormat, get_log_path};
use sortbus::config::{Config, LoadedConfig};
use sortbus::{SortOutcome, SortReport, check_sorted};

fn setup_logging(level: Option<&str>) -> Result<()> {
    let level: tracing::Level = match level {
        Some(level) => level.parse().map_err(|_| eyre::eyre!("Unknown log level: {}", level))?,
        None => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    // Write to the log file, never stdout
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let log_file = fs::create_dir_all(&log_dir)
        .context("Failed to create log directory")
        .and_then(|_| fs::File::create(&log_path).context("Failed to create log file"));

    match log_file {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
            warn!("Logging to stderr: {:#}", e);
        }
    }

    info!("Logging initialized (level: {})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration first so the file can pick the log level
    let LoadedConfig {
        mut config,
        source,
        skipped,
    } = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.run.apply(&mut config);

    let log_level = cli.log_level.as_deref().or(config.log_level.as_deref());
    setup_logging(log_level).context("Failed to setup logging")?;

    for file in &skipped {
        warn!("Failed to load config from {}: {:#}", file.path.display(), file.error);
        eprintln!(
            "{} skipped config {}: {:#}",
            "warning:".yellow(),
            file.path.display(),
            file.error
        );
    }
    match &source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    config.validate().context("Invalid configuration")?;
    info!(
        array_size = config.sort.array_size,
        threads = config.sort.thread_count,
        threshold = config.sort.insertion_threshold,
        "sb loaded config"
    );

    match cli.command {
        Some(Command::Config) => cmd_config(&config),
        None => cmd_run(&config, cli.run.format),
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Generate, sort, verify and print the summary
fn cmd_run(config: &Config, format: OutputFormat) -> Result<()> {
    let SortOutcome { data, report } = sortbus::run(&config.sort, config.seed).context("Sort run failed")?;

    if let Err(unsorted) = check_sorted(&data) {
        eprintln!("{} {}", "✗".red(), unsorted);
        return Err(unsorted).context("Verification failed");
    }
    info!(elements = data.len(), "sb: verification passed");

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_text(&report);
            Ok(())
        }
    }
}

fn print_json(report: &SortReport) -> Result<()> {
    let output = serde_json::json!({
        "sorted": true,
        "elapsed_ms": report.elapsed.as_secs_f64() * 1000.0,
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(report: &SortReport) {
    println!(
        "{} Sorted {} elements with {} threads in {:.3}ms",
        "✓".green(),
        report.elements.to_string().cyan(),
        report.thread_count,
        report.elapsed.as_secs_f64() * 1000.0
    );
    println!(
        "  Threshold: {}  Capacity: {}  Topology: {}  Shutdown: {}",
        report.insertion_threshold, report.channel_capacity, report.topology, report.shutdown
    );
    println!(
        "  Finished ranges: {}  Partitions: {}  Forwarded: {}",
        report.completion.finished_ranges,
        report.total_partitions(),
        report.completion.forwarded
    );

    println!("{}", "Channels:".bold());
    let work = &report.work_channel;
    println!(
        "  work  sent {} received {} blocked sends {} blocked receives {} peak {}",
        work.sent, work.received, work.blocked_sends, work.blocked_receives, work.peak_depth
    );
    if let Some(done) = &report.done_channel {
        println!(
            "  done  sent {} received {} blocked sends {} blocked receives {} peak {}",
            done.sent, done.received, done.blocked_sends, done.blocked_receives, done.peak_depth
        );
    }

    println!("{}", "Workers:".bold());
    for worker in &report.workers {
        println!(
            "  {} partitions {} insertion sorts {} elements {} overflowed {}",
            format!("#{}", worker.id).yellow(),
            worker.partitions,
            worker.insertion_sorts,
            worker.elements_sorted,
            worker.overflowed.to_string().dimmed()
        );
    }
}
