//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;
use crate::coordinator::{ShutdownMode, Topology};

/// SortBus - parallel quicksort over a bounded message bus
#[derive(Debug, Parser)]
#[command(
    name = "sb",
    about = "Sort random doubles with a worker pool that talks through a bounded channel",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", global = true, help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the effective configuration as YAML
    Config,
}

/// Overrides for a sort run
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Number of random values to sort
    #[arg(short = 'n', long = "array-size")]
    pub array_size: Option<usize>,

    /// Worker threads
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Insertion-sort ranges of at most this many elements
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Channel capacity (defaults to the array size)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Seed for the input generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shutdown protocol (broadcast, chain)
    #[arg(long)]
    pub shutdown: Option<ShutdownMode>,

    /// Channel layout (split, shared)
    #[arg(long)]
    pub topology: Option<Topology>,

    /// Include every finished range in the report
    #[arg(long)]
    pub record_ranges: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl RunArgs {
    /// Apply the flags that were given on top of a loaded config
    pub fn apply(&self, config: &mut Config) {
        debug!(args = ?self, "RunArgs::apply: called");
        let sort = &mut config.sort;
        if let Some(array_size) = self.array_size {
            sort.array_size = array_size;
        }
        if let Some(threads) = self.threads {
            sort.thread_count = threads;
        }
        if let Some(threshold) = self.threshold {
            sort.insertion_threshold = threshold;
        }
        if let Some(capacity) = self.capacity {
            sort.channel_capacity = Some(capacity);
        }
        if let Some(shutdown) = self.shutdown {
            sort.shutdown = shutdown;
        }
        if let Some(topology) = self.topology {
            sort.topology = topology;
        }
        if self.record_ranges {
            sort.record_ranges = true;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
    }
}

/// Output format for the run summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sortbus")
        .join("logs")
        .join("sortbus.log");
    debug!(?path, "get_log_path: returning path");
    path
}
