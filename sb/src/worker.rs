//! Worker loop: pull a task, partition or finish it, push what follows
//!
//! A worker reads from the work channel and reports completed ranges on the
//! done channel. With the shared topology both are the same channel, which is
//! why a worker forwards any `Finish` it happens to dequeue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use serde::Serialize;
use tracing::{debug, error, trace};

use crate::channel::{Channel, Full};
use crate::coordinator::{ShutdownMode, Task};
use crate::partition::{insertion_sort, partition};

/// Flags shared by the pool for an emergency stop
///
/// Normal shutdown is message driven. These are only consulted when the
/// coordinator has to tear the pool down after a protocol violation.
#[derive(Debug, Default)]
pub struct PoolSignals {
    stop: AtomicBool,
    live: AtomicUsize,
}

impl PoolSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Count a worker before its thread is spawned
    pub fn worker_started(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_exited(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Marks a worker as gone when its loop ends, however it ends
///
/// A worker that unwinds never sends the `Finish` for the range it held, so
/// the pool is stopped as well and the coordinator stops waiting for it.
struct ExitGuard<'c> {
    id: usize,
    signals: &'c PoolSignals,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(id = self.id, "Worker: panicked, stopping pool");
            self.signals.request_stop();
        }
        self.signals.worker_exited();
    }
}

/// What a single worker did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub id: usize,
    /// Ranges split in two
    pub partitions: u64,
    /// Ranges finished with insertion sort
    pub insertion_sorts: u64,
    pub elements_sorted: u64,
    /// `Finish` messages passed along to the coordinator
    pub forwarded: u64,
    /// Derived ranges kept locally because the work channel was full
    pub overflowed: u64,
}

/// One member of the pool
pub struct Worker<'c, 'a> {
    inbox: &'c Channel<Task<'a>>,
    outbox: &'c Channel<Task<'a>>,
    signals: &'c PoolSignals,
    threshold: usize,
    shutdown: ShutdownMode,
    backlog: Vec<Task<'a>>,
    report: WorkerReport,
}

impl<'c, 'a> Worker<'c, 'a> {
    /// Build a worker reading `inbox` (work) and reporting on `outbox` (done)
    pub fn new(
        id: usize,
        inbox: &'c Channel<Task<'a>>,
        outbox: &'c Channel<Task<'a>>,
        signals: &'c PoolSignals,
        threshold: usize,
        shutdown: ShutdownMode,
    ) -> Self {
        debug!(id, threshold, %shutdown, "Worker::new: called");
        Self {
            inbox,
            outbox,
            signals,
            threshold,
            shutdown,
            backlog: Vec::new(),
            report: WorkerReport {
                id,
                ..Default::default()
            },
        }
    }

    /// Run until a `Shutdown` arrives (or the pool is stopped)
    pub fn run(mut self) -> WorkerReport {
        debug!(id = self.report.id, "Worker::run: started");
        let _exit = ExitGuard {
            id: self.report.id,
            signals: self.signals,
        };
        loop {
            if self.signals.stop_requested() {
                break;
            }
            let task = match self.backlog.pop() {
                Some(task) => task,
                None => self.inbox.receive(),
            };
            if self.signals.stop_requested() {
                debug!(id = self.report.id, ?task, "Worker::run: stop requested, dropping task");
                break;
            }

            match task {
                Task::Shutdown => {
                    if self.shutdown == ShutdownMode::Chain {
                        self.inbox.send(Task::Shutdown);
                    }
                    break;
                }
                Task::Finish { .. } => {
                    trace!(id = self.report.id, ?task, "Worker::run: forwarding");
                    self.report.forwarded += 1;
                    self.outbox.send(task);
                }
                Task::Work { begin, chunk } => self.process(begin, chunk),
            }
        }

        debug!(report = ?self.report, "Worker::run: terminated");
        self.report
    }

    fn process(&mut self, begin: usize, chunk: &'a mut [f64]) {
        let len = chunk.len();
        if len <= self.threshold {
            insertion_sort(chunk);
            self.report.insertion_sorts += 1;
            self.report.elements_sorted += len as u64;
            self.outbox.send(Task::finish(begin..begin + len));
            return;
        }

        let split = partition(chunk);
        assert!(
            split > 0 && split < len,
            "partition of {}..{} returned split {}",
            begin,
            begin + len,
            split
        );
        self.report.partitions += 1;

        let (left, right) = chunk.split_at_mut(split);
        self.submit(Task::work(begin, left));
        self.submit(Task::work(begin + split, right));
    }

    /// Publish derived work, keeping it locally when the channel is full
    ///
    /// Every worker is also a consumer of the work channel, so blocking here
    /// could leave the whole pool waiting on a queue nobody drains.
    fn submit(&mut self, task: Task<'a>) {
        if let Err(Full(task)) = self.inbox.try_send(task) {
            trace!(id = self.report.id, ?task, "Worker::submit: work channel full, keeping locally");
            self.report.overflowed += 1;
            self.backlog.push(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn drain_finished(done: &Channel<Task<'_>>) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        while let Some(task) = done.try_receive() {
            match task {
                Task::Finish { begin, end } => ranges.push((begin, end)),
                other => panic!("unexpected {:?} on done channel", other),
            }
        }
        ranges.sort_unstable();
        ranges
    }

    #[test]
    fn test_small_range_is_insertion_sorted() {
        let mut data = [3.0, 1.0, 2.0];
        let work = Channel::with_capacity(4).unwrap();
        let done = Channel::with_capacity(4).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        work.send(Task::work(0, &mut data));
        work.send(Task::Shutdown);
        let report = Worker::new(0, &work, &done, &signals, 10, ShutdownMode::Broadcast).run();

        assert_eq!(drain_finished(&done), vec![(0, 3)]);
        assert_eq!(report.insertion_sorts, 1);
        assert_eq!(report.partitions, 0);
        assert_eq!(signals.live_workers(), 0);
        assert_eq!(data, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_large_range_is_split_in_order() {
        let mut data: Vec<f64> = (0..20).rev().map(f64::from).collect();
        let work = Channel::with_capacity(8).unwrap();
        let done = Channel::with_capacity(8).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        // The worker would also process the two halves, so stop it right after the split
        {
            let mut worker = Worker::new(0, &work, &done, &signals, 4, ShutdownMode::Broadcast);
            worker.process(0, &mut data);
            assert_eq!(worker.report.partitions, 1);
        }

        let left = work.receive();
        let right = work.receive();
        let (l, r) = (left.range(), right.range());
        assert_eq!(l.start, 0);
        assert_eq!(l.end, r.start);
        assert_eq!(r.end, 20);
        assert!(done.is_empty());
    }

    #[test]
    fn test_full_channel_keeps_work_locally() {
        let mut data: Vec<f64> = (0..64).map(|i| ((i * 37) % 64) as f64).collect();
        let expected = {
            let mut sorted = data.clone();
            sorted.sort_by(f64::total_cmp);
            sorted
        };
        let work = Channel::with_capacity(1).unwrap();
        let done = Channel::with_capacity(64).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        thread::scope(|scope| {
            let worker = Worker::new(0, &work, &done, &signals, 3, ShutdownMode::Broadcast);
            let handle = scope.spawn(move || worker.run());
            work.send(Task::work(0, &mut data));

            let mut finished = 0;
            while finished < 64 {
                if let Task::Finish { begin, end } = done.receive() {
                    finished += end - begin;
                }
            }
            work.send(Task::Shutdown);
            let report = handle.join().unwrap();
            assert!(report.overflowed > 0);
            assert_eq!(report.elements_sorted, 64);
        });

        assert_eq!(data, expected);
    }

    #[test]
    fn test_finish_is_forwarded_to_outbox() {
        let work = Channel::with_capacity(4).unwrap();
        let done = Channel::with_capacity(4).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        work.send(Task::finish(3..7));
        work.send(Task::Shutdown);
        let report = Worker::new(1, &work, &done, &signals, 10, ShutdownMode::Broadcast).run();

        assert_eq!(report.forwarded, 1);
        assert_eq!(drain_finished(&done), vec![(3, 7)]);
    }

    #[test]
    fn test_chain_shutdown_is_resent_once() {
        let work = Channel::<Task<'_>>::with_capacity(2).unwrap();
        let done = Channel::with_capacity(2).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        work.send(Task::Shutdown);
        Worker::new(0, &work, &done, &signals, 10, ShutdownMode::Chain).run();

        assert_eq!(work.len(), 1);
        assert!(matches!(work.try_receive(), Some(Task::Shutdown)));
    }

    #[test]
    fn test_broadcast_shutdown_is_consumed() {
        let work = Channel::<Task<'_>>::with_capacity(2).unwrap();
        let done = Channel::with_capacity(2).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        work.send(Task::Shutdown);
        Worker::new(0, &work, &done, &signals, 10, ShutdownMode::Broadcast).run();
        assert!(work.is_empty());
    }

    #[test]
    fn test_panicking_worker_stops_pool() {
        let mut data = [2.0, 1.0];
        let work = Channel::with_capacity(2).unwrap();
        let done = Channel::<Task<'_>>::with_capacity(2).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();

        // A threshold below two hands a two-element range to partition
        work.send(Task::work(0, &mut data));
        let result = thread::scope(|scope| {
            let worker = Worker::new(0, &work, &done, &signals, 1, ShutdownMode::Broadcast);
            scope.spawn(move || worker.run()).join()
        });

        assert!(result.is_err());
        assert!(signals.stop_requested());
        assert_eq!(signals.live_workers(), 0);
        assert!(done.is_empty());
    }

    #[test]
    fn test_stop_request_drops_pending_work() {
        let mut data = [2.0, 1.0];
        let work = Channel::with_capacity(2).unwrap();
        let done = Channel::with_capacity(2).unwrap();
        let signals = PoolSignals::new();
        signals.worker_started();
        signals.request_stop();

        work.send(Task::work(0, &mut data));
        let report = Worker::new(0, &work, &done, &signals, 10, ShutdownMode::Broadcast).run();
        assert_eq!(report.insertion_sorts, 0);
        assert!(done.is_empty());
        assert_eq!(signals.live_workers(), 0);
    }
}
