//! Sorter - entry point wiring channels, workers and the coordinator

use std::panic;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::channel::Channel;
use crate::coordinator::{
    CompletionReport, Coordinator, ShutdownMode, SortConfig, SortReport, Task, Topology, release_workers,
};
use crate::error::{SortError, SortResult};
use crate::input::random_values;
use crate::worker::{PoolSignals, Worker, WorkerReport};

/// Sorted data together with the run report
#[derive(Debug, Clone)]
pub struct SortOutcome {
    pub data: Vec<f64>,
    pub report: SortReport,
}

/// Runs the parallel quicksort with a fixed configuration
///
/// Each call spins up its own pool and channels and joins every worker before
/// returning, so a `Sorter` can be reused and shared freely.
#[derive(Debug, Clone)]
pub struct Sorter {
    config: SortConfig,
}

impl Sorter {
    /// Create a sorter, rejecting invalid configuration up front
    pub fn new(config: SortConfig) -> SortResult<Self> {
        debug!(?config, "Sorter::new: called");
        config.validate()?;
        Ok(Self { config })
    }

    /// Sort an owned buffer and hand it back
    pub fn sort(&self, mut data: Vec<f64>) -> SortResult<SortOutcome> {
        let report = self.sort_slice(&mut data)?;
        Ok(SortOutcome { data, report })
    }

    /// Sort `data` in place
    ///
    /// # Panics
    ///
    /// If the coordinator detects a protocol violation, or a worker panics.
    /// The pool is stopped and joined first.
    pub fn sort_slice(&self, data: &mut [f64]) -> SortResult<SortReport> {
        debug!(len = data.len(), "Sorter::sort_slice: called");
        let capacity = self.config.capacity_for(data.len())?;
        self.run_pool(data, capacity)
    }

    fn run_pool(&self, data: &mut [f64], capacity: usize) -> SortResult<SortReport> {
        let len = data.len();
        let work = Channel::with_capacity(capacity)?;
        let split_done = match self.config.topology {
            Topology::Split => Some(Channel::with_capacity(capacity)?),
            Topology::Shared => None,
        };
        let done = split_done.as_ref().unwrap_or(&work);
        let work = &work;
        let signals = &PoolSignals::new();

        let started = Instant::now();
        let outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.thread_count);
            for id in 0..self.config.thread_count {
                let worker = Worker::new(
                    id,
                    work,
                    done,
                    signals,
                    self.config.insertion_threshold,
                    self.config.shutdown,
                );
                signals.worker_started();
                let spawned = thread::Builder::new()
                    .name(format!("sortbus-worker-{}", id))
                    .spawn_scoped(scope, move || worker.run());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        error!(id, error = %source, "Sorter: failed to spawn worker, releasing pool");
                        abandon_spawn(work, self.config.shutdown, signals, handles);
                        return Err(SortError::ThreadSpawn { index: id, source });
                    }
                }
            }
            debug!(workers = handles.len(), "Sorter: pool started");

            let mut coordinator = Coordinator::new(work, done, len).with_range_log(self.config.record_ranges);
            let run = match coordinator.seed(data) {
                Ok(()) => coordinator.await_completion(signals),
                Err(e) => Err(e),
            };
            if let Err(e) = run {
                error!(error = %e, "Sorter: aborting run");
                coordinator.abort(signals);
                join_workers(handles);
                return Err(e);
            }

            coordinator.shutdown(self.config.shutdown, handles.len());
            let workers = join_workers(handles);
            Ok((coordinator.into_report(), workers))
        });
        let elapsed = started.elapsed();

        let (completion, workers): (CompletionReport, Vec<WorkerReport>) = match outcome {
            Ok(parts) => parts,
            Err(SortError::ProtocolViolation(message)) => panic!("sort protocol violated: {}", message),
            Err(e) => return Err(e),
        };
        info!(len, ?elapsed, ranges = completion.finished_ranges, "Sorter: run complete");

        Ok(SortReport {
            elements: len,
            thread_count: self.config.thread_count,
            insertion_threshold: self.config.insertion_threshold,
            channel_capacity: capacity,
            topology: self.config.topology,
            shutdown: self.config.shutdown,
            elapsed,
            completion,
            workers,
            work_channel: work.stats(),
            done_channel: split_done.as_ref().map(Channel::stats),
        })
    }
}

/// Roll back a partly started pool after a spawn failure
///
/// `signals` still counts the worker whose thread never started. The ones in
/// `handles` are told to exit and joined.
fn abandon_spawn<'scope>(
    work: &Channel<Task<'_>>,
    mode: ShutdownMode,
    signals: &PoolSignals,
    handles: Vec<ScopedJoinHandle<'scope, WorkerReport>>,
) -> Vec<WorkerReport> {
    signals.worker_exited();
    release_workers(work, mode, handles.len());
    join_workers(handles)
}

/// Join every worker, re-raising a worker panic on the calling thread
fn join_workers(handles: Vec<ScopedJoinHandle<'_, WorkerReport>>) -> Vec<WorkerReport> {
    handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
        .collect()
}

/// Sort `data` in place with `config`
pub fn sort_with(config: SortConfig, data: &mut [f64]) -> SortResult<SortReport> {
    Sorter::new(config)?.sort_slice(data)
}

/// Generate `config.array_size` random values and sort them
pub fn run(config: &SortConfig, seed: Option<u64>) -> SortResult<SortOutcome> {
    debug!(array_size = config.array_size, ?seed, "run: called");
    let sorter = Sorter::new(config.clone())?;
    let data = random_values(config.array_size, seed)?;
    sorter.sort(data)
}
