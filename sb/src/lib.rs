//! SortBus - parallel quicksort driven through a bounded message bus
//!
//! A fixed pool of worker threads sorts one array of doubles in place. The
//! workers never share state directly: every unit of work is a message on a
//! bounded FIFO channel, and each `Work` message carries exclusive ownership
//! of the slice it covers.
//!
//! # Core Concepts
//!
//! - **Range ownership**: partitioning splits a slice into two disjoint halves
//!   that travel as separate messages
//! - **Completion by counting**: the coordinator sums the lengths of finished
//!   ranges until they cover the whole array
//! - **Message-driven shutdown**: workers exit only when told to
//!
//! # Modules
//!
//! - [`channel`] - Bounded blocking MPMC queue
//! - [`partition`] - Median-of-three partition and insertion sort
//! - [`worker`] - Worker loop and pool signals
//! - [`coordinator`] - Seeding, completion counting, shutdown
//! - [`sorter`] - Entry points tying the pieces together
//! - [`verify`] - Sortedness check
//! - [`config`] - Configuration file loading
//! - [`cli`] - Command-line interface

pub mod channel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod input;
pub mod partition;
pub mod sorter;
pub mod verify;
pub mod worker;

// Re-export commonly used types
pub use channel::{Channel, ChannelStats, Full};
pub use config::Config;
pub use coordinator::{CompletionReport, Coordinator, ShutdownMode, SortConfig, SortReport, Task, TaskKind, Topology};
pub use error::{SortError, SortResult};
pub use input::random_values;
pub use sorter::{SortOutcome, Sorter, run, sort_with};
pub use verify::{Unsorted, check_sorted, is_sorted};
pub use worker::{PoolSignals, Worker, WorkerReport};
