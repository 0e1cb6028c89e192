//! Coordinator for a sort run
//!
//! The Coordinator owns the protocol around the workers:
//! - **Seed:** one Work message covering the whole array
//! - **Count:** sum the lengths of Finish messages until they cover the array
//! - **Shutdown:** release every worker once the count is complete

mod config;
mod core;
mod messages;
mod metrics;

pub use config::{
    DEFAULT_ARRAY_SIZE, DEFAULT_INSERTION_THRESHOLD, DEFAULT_THREAD_COUNT, MIN_INSERTION_THRESHOLD, ShutdownMode,
    SortConfig, Topology,
};
pub use self::core::{Coordinator, release_workers};
pub use messages::{Task, TaskKind};
pub use metrics::{CompletionReport, SortReport};
