//! Coordinator: seeds the run, counts finished elements, stops the pool

use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::channel::{Channel, Full};
use crate::error::{SortError, SortResult};
use crate::worker::PoolSignals;

use super::config::ShutdownMode;
use super::messages::Task;
use super::metrics::CompletionReport;

/// How long the coordinator waits on the done channel before checking the pool
const LIVENESS_POLL: Duration = Duration::from_millis(10);

/// Pause between teardown rounds in [`Coordinator::abort`]
const ABORT_POLL: Duration = Duration::from_millis(1);

/// Abort rounds between warnings while workers are still finishing a range
const ABORT_STALL_ROUNDS: u64 = 1000;

/// Drives one sort run from the calling thread
///
/// Completion is detected by counting: every `Finish` adds its length, and the
/// run is over when the counter reaches the array length.
pub struct Coordinator<'c, 'a> {
    work: &'c Channel<Task<'a>>,
    done: &'c Channel<Task<'a>>,
    total: usize,
    record_ranges: bool,
    report: CompletionReport,
}

impl<'c, 'a> Coordinator<'c, 'a> {
    /// Create a coordinator for an array of `total` elements
    pub fn new(work: &'c Channel<Task<'a>>, done: &'c Channel<Task<'a>>, total: usize) -> Self {
        debug!(total, "Coordinator::new: called");
        Self {
            work,
            done,
            total,
            record_ranges: false,
            report: CompletionReport::default(),
        }
    }

    /// Keep every finished range in the report
    pub fn with_range_log(mut self, enabled: bool) -> Self {
        self.record_ranges = enabled;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.report.elements == self.total
    }

    /// Submit the initial task covering the whole array
    ///
    /// An empty array needs no work at all and is complete immediately.
    pub fn seed(&mut self, data: &'a mut [f64]) -> SortResult<()> {
        debug!(len = data.len(), "Coordinator::seed: called");
        if data.len() != self.total {
            return Err(SortError::ProtocolViolation(format!(
                "seed covers {} elements but the run expects {}",
                data.len(),
                self.total
            )));
        }
        if !data.is_empty() {
            self.work.send(Task::work(0, data));
        }
        Ok(())
    }

    /// Consume messages until the counter reaches the array length
    ///
    /// Fails with `PoolStopped` once `signals` reports a stop, which is how a
    /// worker that died holding a range is noticed.
    pub fn await_completion(&mut self, signals: &PoolSignals) -> SortResult<()> {
        debug!(total = self.total, "Coordinator::await_completion: called");
        while !self.is_complete() {
            if signals.stop_requested() {
                warn!(
                    counted = self.report.elements,
                    total = self.total,
                    "Coordinator::await_completion: pool stopped"
                );
                return Err(SortError::PoolStopped {
                    counted: self.report.elements,
                    total: self.total,
                });
            }
            let Some(task) = self.done.receive_timeout(LIVENESS_POLL) else {
                continue;
            };
            match task {
                Task::Finish { begin, end } => {
                    self.record_finish(begin, end)?;
                }
                other => {
                    // Only reachable with the shared topology
                    debug!(task = ?other, "Coordinator::await_completion: forwarding");
                    self.report.forwarded += 1;
                    self.work.send(other);
                }
            }
        }
        info!(
            elements = self.report.elements,
            ranges = self.report.finished_ranges,
            "Coordinator: all elements sorted"
        );
        Ok(())
    }

    /// Add a finished range to the counter
    ///
    /// Returns true when this range completes the run. Any range outside the
    /// array, or a counter going past the array length, is a protocol violation.
    pub fn record_finish(&mut self, begin: usize, end: usize) -> SortResult<bool> {
        if begin > end || end > self.total {
            return Err(SortError::ProtocolViolation(format!(
                "finished range {}..{} is outside 0..{}",
                begin, end, self.total
            )));
        }
        let counted = self.report.elements + (end - begin);
        if counted > self.total {
            return Err(SortError::ProtocolViolation(format!(
                "completion counter would reach {} of {} after {}..{}",
                counted, self.total, begin, end
            )));
        }

        self.report.elements = counted;
        self.report.finished_ranges += 1;
        if self.record_ranges {
            self.report.ranges.push(begin..end);
        }
        debug!(begin, end, done = counted, total = self.total, "Coordinator: range finished");
        Ok(self.is_complete())
    }

    /// Tell `workers` running workers to exit
    pub fn shutdown(&self, mode: ShutdownMode, workers: usize) {
        debug!(%mode, workers, "Coordinator::shutdown: called");
        release_workers(self.work, mode, workers);
    }

    /// Tear the pool down after a failed run
    ///
    /// With the stop flag set a worker exits at its next loop turn. The only
    /// places a live worker can block are a send on the done channel and a
    /// receive on the work channel. Each round drains the done channel and
    /// offers a Shutdown on the work channel, so every worker exits within a
    /// round of finishing the range it holds.
    pub fn abort(&self, signals: &PoolSignals) {
        warn!(live = signals.live_workers(), "Coordinator::abort: stopping pool");
        signals.request_stop();
        let mut rounds = 0u64;
        while signals.live_workers() > 0 {
            while self.done.try_receive().is_some() {}
            // Full means a message is already queued for every blocked receiver
            if let Err(Full(_)) = self.work.try_send(Task::Shutdown) {
                trace!("Coordinator::abort: work channel full");
            }
            rounds += 1;
            if rounds % ABORT_STALL_ROUNDS == 0 {
                warn!(rounds, live = signals.live_workers(), "Coordinator::abort: workers still running");
            }
            thread::sleep(ABORT_POLL);
        }
        debug!(rounds, "Coordinator::abort: pool stopped");
    }

    pub fn into_report(self) -> CompletionReport {
        self.report
    }
}

/// Put the Shutdown messages for `workers` running workers on the work channel
///
/// Broadcast sends one per worker and each worker consumes exactly one. Chain
/// sends a single message that every worker re-sends once on its way out.
pub fn release_workers(work: &Channel<Task<'_>>, mode: ShutdownMode, workers: usize) {
    debug!(%mode, workers, "release_workers: called");
    match mode {
        ShutdownMode::Broadcast => {
            for _ in 0..workers {
                work.send(Task::Shutdown);
            }
        }
        ShutdownMode::Chain => {
            if workers > 0 {
                work.send(Task::Shutdown);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::TaskKind;

    #[test]
    fn test_counter_reaches_total_once() {
        let work = Channel::<Task<'_>>::with_capacity(4).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 9);

        assert!(!coordinator.record_finish(0, 3).unwrap());
        assert!(!coordinator.record_finish(6, 9).unwrap());
        assert!(coordinator.record_finish(3, 6).unwrap());
        assert_eq!(coordinator.report.elements, 9);
        assert_eq!(coordinator.into_report().finished_ranges, 3);
    }

    #[test]
    fn test_out_of_range_finish_is_violation() {
        let work = Channel::<Task<'_>>::with_capacity(4).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 5);
        assert!(matches!(
            coordinator.record_finish(3, 6),
            Err(SortError::ProtocolViolation(_))
        ));
        assert!(matches!(
            coordinator.record_finish(4, 2),
            Err(SortError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_overcount_is_violation() {
        let work = Channel::<Task<'_>>::with_capacity(4).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 4);
        coordinator.record_finish(0, 4).unwrap();
        assert!(matches!(
            coordinator.record_finish(0, 1),
            Err(SortError::ProtocolViolation(_))
        ));
        assert_eq!(coordinator.report.elements, 4);
    }

    #[test]
    fn test_empty_seed_is_already_complete() {
        let mut data: [f64; 0] = [];
        let work = Channel::with_capacity(1).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 0);
        coordinator.seed(&mut data).unwrap();
        assert!(work.is_empty());
        coordinator.await_completion(&PoolSignals::new()).unwrap();
        assert!(coordinator.is_complete());
    }

    #[test]
    fn test_seed_length_mismatch() {
        let mut data = [1.0, 2.0];
        let work = Channel::with_capacity(1).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 3);
        assert!(coordinator.seed(&mut data).is_err());
    }

    #[test]
    fn test_forwards_foreign_messages_on_shared_channel() {
        let mut data = [1.0, 2.0, 3.0, 4.0];
        let (_, tail) = data.split_at_mut(2);
        let bus = Channel::with_capacity(8).unwrap();
        let mut coordinator = Coordinator::new(&bus, &bus, 4);

        // A Work message ahead of the Finish messages gets put back on the bus
        bus.send(Task::work(2, tail));
        bus.send(Task::finish(0..2));
        bus.send(Task::finish(2..4));
        coordinator.await_completion(&PoolSignals::new()).unwrap();

        let report = coordinator.into_report();
        assert_eq!(report.forwarded, 1);
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.receive().kind(), TaskKind::Work);
    }

    #[test]
    fn test_broadcast_sends_one_shutdown_per_worker() {
        let work = Channel::<Task<'_>>::with_capacity(8).unwrap();
        let coordinator = Coordinator::new(&work, &work, 0);
        coordinator.shutdown(ShutdownMode::Broadcast, 3);
        assert_eq!(work.len(), 3);

        let chain = Channel::<Task<'_>>::with_capacity(8).unwrap();
        let coordinator = Coordinator::new(&chain, &chain, 0);
        coordinator.shutdown(ShutdownMode::Chain, 3);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_abort_releases_idle_workers() {
        use crate::worker::Worker;

        let work = Channel::<Task<'_>>::with_capacity(1).unwrap();
        let done = Channel::<Task<'_>>::with_capacity(1).unwrap();
        let signals = PoolSignals::new();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|id| {
                    signals.worker_started();
                    let worker = Worker::new(id, &work, &done, &signals, 10, ShutdownMode::Broadcast);
                    scope.spawn(move || worker.run())
                })
                .collect();

            Coordinator::new(&work, &done, 10).abort(&signals);
            for handle in handles {
                handle.join().unwrap();
            }
        });
        assert_eq!(signals.live_workers(), 0);
        assert!(signals.stop_requested());
    }

    #[test]
    fn test_stopped_pool_ends_wait() {
        let work = Channel::<Task<'_>>::with_capacity(4).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 8);
        coordinator.record_finish(0, 3).unwrap();

        let signals = PoolSignals::new();
        signals.request_stop();
        assert!(matches!(
            coordinator.await_completion(&signals),
            Err(SortError::PoolStopped { counted: 3, total: 8 })
        ));
    }

    #[test]
    fn test_worker_panic_does_not_hang_coordinator() {
        use crate::worker::Worker;

        let mut data = [2.0, 1.0];
        let work = Channel::with_capacity(2).unwrap();
        let done = Channel::with_capacity(2).unwrap();
        let signals = PoolSignals::new();

        let (result, joined) = thread::scope(|scope| {
            signals.worker_started();
            // Threshold 1 sends a two-element range into partition, which panics
            let worker = Worker::new(0, &work, &done, &signals, 1, ShutdownMode::Broadcast);
            let handle = scope.spawn(move || worker.run());

            let mut coordinator = Coordinator::new(&work, &done, 2);
            coordinator.seed(&mut data).unwrap();
            let result = coordinator.await_completion(&signals);
            coordinator.abort(&signals);
            (result, handle.join())
        });

        assert!(matches!(result, Err(SortError::PoolStopped { counted: 0, total: 2 })));
        assert!(joined.is_err());
        assert_eq!(signals.live_workers(), 0);
    }

    #[test]
    fn test_range_log() {
        let work = Channel::<Task<'_>>::with_capacity(1).unwrap();
        let mut coordinator = Coordinator::new(&work, &work, 6).with_range_log(true);
        coordinator.record_finish(2, 6).unwrap();
        coordinator.record_finish(0, 2).unwrap();
        let report = coordinator.into_report();
        assert_eq!(report.ranges, vec![2..6, 0..2]);
        assert!(report.ranges_tile(6));
    }
}
