//! Reports produced by a sort run

use std::ops::Range;
use std::time::Duration;

use serde::Serialize;

use crate::channel::ChannelStats;
use crate::worker::WorkerReport;

use super::config::{ShutdownMode, Topology};

/// Coordinator-side view of completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    /// Final value of the completion counter
    pub elements: usize,
    /// Number of `Finish` messages consumed
    pub finished_ranges: u64,
    /// Messages the coordinator had to put back on the bus
    pub forwarded: u64,
    /// Every finished range, in arrival order (only with `record-ranges`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<Range<usize>>,
}

impl CompletionReport {
    /// True when the recorded ranges tile `0..len` with no gap or overlap
    pub fn ranges_tile(&self, len: usize) -> bool {
        let mut sorted = self.ranges.clone();
        sorted.sort_unstable_by_key(|r| r.start);
        let mut next = 0;
        for range in &sorted {
            if range.start != next || range.end < range.start {
                return false;
            }
            next = range.end;
        }
        next == len
    }
}

/// Everything observed during one call to the sorter
#[derive(Debug, Clone, Serialize)]
pub struct SortReport {
    pub elements: usize,
    pub thread_count: usize,
    pub insertion_threshold: usize,
    pub channel_capacity: usize,
    pub topology: Topology,
    pub shutdown: ShutdownMode,
    pub elapsed: Duration,
    pub completion: CompletionReport,
    pub workers: Vec<WorkerReport>,
    pub work_channel: ChannelStats,
    /// Present only with the split topology
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_channel: Option<ChannelStats>,
}

impl SortReport {
    pub fn total_partitions(&self) -> u64 {
        self.workers.iter().map(|w| w.partitions).sum()
    }

    pub fn total_insertion_sorts(&self) -> u64 {
        self.workers.iter().map(|w| w.insertion_sorts).sum()
    }
}
