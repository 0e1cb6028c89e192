//! Bounded blocking FIFO shared by every thread in a sort run
//!
//! One mutex guards the queue; two condition variables signal
//! space-available (wakes senders) and message-available (wakes receivers).
//! Messages are never dropped, duplicated or reordered, and there is no
//! closed state: termination travels through the queue like any other message.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{SortError, SortResult};

/// Counters describing how a channel was used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub sent: u64,
    pub received: u64,
    /// Sends that found the queue full and had to wait
    pub blocked_sends: u64,
    /// Receives that found the queue empty and had to wait
    pub blocked_receives: u64,
    /// `try_send` calls turned away because the queue was full
    pub rejected_sends: u64,
    pub peak_depth: usize,
}

/// Returned by [`Channel::try_send`] when the queue is at capacity
#[derive(Debug, PartialEq, Eq)]
pub struct Full<T>(pub T);

struct ChannelState<T> {
    queue: VecDeque<T>,
    stats: ChannelStats,
}

/// Fixed-capacity multi-producer multi-consumer queue
pub struct Channel<T> {
    capacity: usize,
    state: Mutex<ChannelState<T>>,
    message_available: Condvar,
    space_available: Condvar,
}

impl<T> Channel<T> {
    /// Create a channel holding at most `capacity` pending messages
    ///
    /// The whole buffer is reserved up front so an allocation failure
    /// surfaces here, before any thread depends on the channel.
    pub fn with_capacity(capacity: usize) -> SortResult<Self> {
        debug!(capacity, "Channel::with_capacity: called");
        if capacity == 0 {
            return Err(SortError::InvalidConfig(
                "channel-capacity must be at least 1".to_string(),
            ));
        }

        let mut queue = VecDeque::new();
        queue.try_reserve_exact(capacity).map_err(|source| SortError::Allocation {
            what: "channel buffer",
            len: capacity,
            source,
        })?;

        Ok(Self {
            capacity,
            state: Mutex::new(ChannelState {
                queue,
                stats: ChannelStats::default(),
            }),
            message_available: Condvar::new(),
            space_available: Condvar::new(),
        })
    }

    /// Enqueue at the tail, waiting while the queue is full
    pub fn send(&self, message: T) {
        let mut state = self.state.lock();
        if state.queue.len() >= self.capacity {
            state.stats.blocked_sends += 1;
            trace!(capacity = self.capacity, "Channel::send: queue full, waiting");
            while state.queue.len() >= self.capacity {
                self.space_available.wait(&mut state);
            }
        }
        Self::push(&mut state, message);
        self.message_available.notify_one();
    }

    /// Enqueue at the tail only if there is room right now
    pub fn try_send(&self, message: T) -> Result<(), Full<T>> {
        let mut state = self.state.lock();
        if state.queue.len() >= self.capacity {
            state.stats.rejected_sends += 1;
            return Err(Full(message));
        }
        Self::push(&mut state, message);
        self.message_available.notify_one();
        Ok(())
    }

    /// Dequeue from the head, waiting while the queue is empty
    pub fn receive(&self) -> T {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            state.stats.blocked_receives += 1;
            trace!("Channel::receive: queue empty, waiting");
        }
        loop {
            if let Some(message) = state.queue.pop_front() {
                state.stats.received += 1;
                self.space_available.notify_one();
                return message;
            }
            self.message_available.wait(&mut state);
        }
    }

    /// Dequeue from the head, waiting at most `timeout` for a message
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            state.stats.blocked_receives += 1;
        }
        loop {
            if let Some(message) = state.queue.pop_front() {
                state.stats.received += 1;
                self.space_available.notify_one();
                return Some(message);
            }
            if self.message_available.wait_until(&mut state, deadline).timed_out() && state.queue.is_empty() {
                return None;
            }
        }
    }

    /// Dequeue from the head if a message is pending
    pub fn try_receive(&self) -> Option<T> {
        let mut state = self.state.lock();
        let message = state.queue.pop_front()?;
        state.stats.received += 1;
        self.space_available.notify_one();
        Some(message)
    }

    fn push(state: &mut ChannelState<T>, message: T) {
        state.queue.push_back(message);
        state.stats.sent += 1;
        state.stats.peak_depth = state.stats.peak_depth.max(state.queue.len());
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> ChannelStats {
        self.state.lock().stats
    }
}
