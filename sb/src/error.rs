//! Error types for the sort pipeline

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors from setting up or driving a sort run
#[derive(Debug, Error)]
pub enum SortError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Allocation failed for {what} ({len} elements)")]
    Allocation {
        what: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("Failed to spawn worker thread {index}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Worker pool stopped with {counted} of {total} elements sorted")]
    PoolStopped { counted: usize, total: usize },
}

/// Result alias used throughout the library
pub type SortResult<T> = Result<T, SortError>;
