//! Sort run configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SortError, SortResult};

/// How messages are routed between the coordinator and the workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Work and completion travel on separate channels
    #[default]
    Split,

    /// One channel carries every message; participants forward what is not theirs
    Shared,
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "split" => Ok(Self::Split),
            "shared" => Ok(Self::Shared),
            _ => Err(format!("Unknown topology: {}. Use: split or shared", s)),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split => write!(f, "split"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// How the pool is told to stop once the array is sorted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    /// One Shutdown per worker; each worker consumes exactly one and exits
    #[default]
    Broadcast,

    /// A single Shutdown that every worker re-sends once before exiting
    Chain,
}

impl FromStr for ShutdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broadcast" => Ok(Self::Broadcast),
            "chain" => Ok(Self::Chain),
            _ => Err(format!("Unknown shutdown mode: {}. Use: broadcast or chain", s)),
        }
    }
}

impl fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => write!(f, "broadcast"),
            Self::Chain => write!(f, "chain"),
        }
    }
}

/// Options for one sort run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Number of elements to generate when the run creates its own input
    #[serde(rename = "array-size")]
    pub array_size: usize,

    /// Worker threads in the pool
    #[serde(rename = "thread-count")]
    pub thread_count: usize,

    /// Ranges of at most this many elements are insertion-sorted
    #[serde(rename = "insertion-threshold")]
    pub insertion_threshold: usize,

    /// Pending-message limit per channel (defaults to the array length)
    #[serde(rename = "channel-capacity", skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,

    pub topology: Topology,

    pub shutdown: ShutdownMode,

    /// Keep every finished range in the completion report
    #[serde(rename = "record-ranges")]
    pub record_ranges: bool,
}

pub const DEFAULT_ARRAY_SIZE: usize = 1_000_000;
pub const DEFAULT_THREAD_COUNT: usize = 4;
pub const DEFAULT_INSERTION_THRESHOLD: usize = 10;

/// Smallest threshold that keeps every partitioned range at three or more elements
pub const MIN_INSERTION_THRESHOLD: usize = 2;

impl Default for SortConfig {
    fn default() -> Self {
        debug!("SortConfig::default: called");
        Self {
            array_size: DEFAULT_ARRAY_SIZE,
            thread_count: DEFAULT_THREAD_COUNT,
            insertion_threshold: DEFAULT_INSERTION_THRESHOLD,
            channel_capacity: None,
            topology: Topology::default(),
            shutdown: ShutdownMode::default(),
            record_ranges: false,
        }
    }
}

impl SortConfig {
    /// Check the options that do not depend on the input length
    pub fn validate(&self) -> SortResult<()> {
        debug!(config = ?self, "SortConfig::validate: called");
        if self.thread_count == 0 {
            return Err(SortError::InvalidConfig(
                "thread-count must be at least 1".to_string(),
            ));
        }
        if self.insertion_threshold < MIN_INSERTION_THRESHOLD {
            return Err(SortError::InvalidConfig(format!(
                "insertion-threshold must be at least {}, got {}",
                MIN_INSERTION_THRESHOLD, self.insertion_threshold
            )));
        }
        if self.channel_capacity == Some(0) {
            return Err(SortError::InvalidConfig(
                "channel-capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate against a concrete input and return the channel capacity to use
    ///
    /// With a shared channel every participant is also a producer, so the
    /// queue must be able to hold one message per element.
    pub fn capacity_for(&self, len: usize) -> SortResult<usize> {
        debug!(len, channel_capacity = ?self.channel_capacity, topology = %self.topology, "SortConfig::capacity_for: called");
        self.validate()?;
        let capacity = self.channel_capacity.unwrap_or(len).max(1);
        if self.topology == Topology::Shared && capacity < len {
            return Err(SortError::InvalidConfig(format!(
                "shared topology needs channel-capacity >= array length ({} < {})",
                capacity, len
            )));
        }
        Ok(capacity)
    }
}
