//! Unbounded FIFO work queue with a one-way close signal.
//!
//! Any number of producers push with [`Queue::enqueue`] and any number of
//! consumers pull with [`Queue::dequeue`], which blocks while the queue is
//! empty and still open. [`Queue::close`] declares that no more work will
//! arrive: further enqueues fail with [`Error::Closed`], and consumers keep
//! draining whatever is buffered before they observe `None`.
//!
//! The buffer and the closed flag live behind a single mutex so that
//! "empty and closed" is never observed torn from "empty and open".

use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use opentelemetry::{KeyValue, StringValue};
use opentelemetry::metrics::Counter;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Name used by [`Queue::new`] in log fields and metric attributes.
pub const DEFAULT_QUEUE_NAME: &str = "queue";

/// A thread-safe, unbounded, closable FIFO queue.
///
/// Share it between threads with `Arc<Queue<T>>` or a scoped borrow; the
/// queue itself owns no threads.
pub struct Queue<T> {
    name: String,
    state: Mutex<State<T>>,
    wake: Condvar,
    operations: Counter<u64>,
    /// `queue` metric attribute. Shares the name so cloning never allocates.
    label: KeyValue,
}

/// Everything guarded by the queue lock.
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    enqueued: u64,
    dequeued: u64,
}

impl<T> State<T> {
    fn pop(&mut self) -> Option<T> {
        let item = self.items.pop_front()?;
        self.dequeued += 1;
        Some(item)
    }
}

/// Outcome of a non-blocking or timed dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeued<T> {
    /// An item was removed from the head of the queue.
    Item(T),
    /// Nothing buffered, but the queue is still open.
    Empty,
    /// Nothing buffered and the queue is closed. Sticky.
    Drained,
}

impl<T> Dequeued<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Dequeued::Item(item) => Some(item),
            Dequeued::Empty | Dequeued::Drained => None,
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(self, Dequeued::Drained)
    }
}

/// Point-in-time counters, read atomically under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items accepted by `enqueue` over the queue's lifetime.
    pub enqueued: u64,
    /// Items handed out to consumers over the queue's lifetime.
    pub dequeued: u64,
    /// Items currently buffered.
    pub pending: usize,
    pub closed: bool,
}

impl<T> Queue<T> {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self::named(DEFAULT_QUEUE_NAME)
    }

    /// Create an empty, open queue labelled `name` in logs and metrics.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: KeyValue::new("queue", StringValue::from(Arc::<str>::from(name.as_str()))),
            name,
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
                enqueued: 0,
                dequeued: 0,
            }),
            wake: Condvar::new(),
            operations: metrics::queue_operations(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `value` to the tail of the queue and wake one waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if [`close`](Self::close) has already been
    /// called. The queue is left untouched and `value` is dropped.
    pub fn enqueue(&self, value: T) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            warn!(queue = %self.name, "enqueue rejected, queue is closed");
            self.record("rejected");
            return Err(Error::Closed {
                queue: self.name.clone(),
            });
        }
        state.items.push_back(value);
        state.enqueued += 1;
        let pending = state.items.len();
        drop(state);

        self.wake.notify_one();
        trace!(queue = %self.name, pending, "enqueued");
        self.record("enqueue");
        Ok(())
    }

    /// Remove and return the head of the queue, blocking while the queue is
    /// empty and open.
    ///
    /// Returns `None` once the queue is closed and fully drained. From then
    /// on every call returns `None`.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.pop() {
                let pending = state.items.len();
                drop(state);
                self.delivered(pending);
                return Some(item);
            }
            if state.closed {
                return None;
            }
            // Woken waiters recheck both conditions; wakeups may be spurious.
            state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but never blocks.
    pub fn try_dequeue(&self) -> Dequeued<T> {
        let mut state = self.lock();
        match state.pop() {
            Some(item) => {
                let pending = state.items.len();
                drop(state);
                self.delivered(pending);
                Dequeued::Item(item)
            }
            None if state.closed => Dequeued::Drained,
            None => Dequeued::Empty,
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`,
    /// returning [`Dequeued::Empty`].
    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeued<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return match self.dequeue() {
                Some(item) => Dequeued::Item(item),
                None => Dequeued::Drained,
            };
        };

        let mut state = self.lock();
        loop {
            if let Some(item) = state.pop() {
                let pending = state.items.len();
                drop(state);
                self.delivered(pending);
                return Dequeued::Item(item);
            }
            if state.closed {
                return Dequeued::Drained;
            }
            let now = Instant::now();
            if now >= deadline {
                return Dequeued::Empty;
            }
            state = match self.wake.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Declare that no more work will be enqueued and wake every waiting
    /// consumer.
    ///
    /// Returns `true` if this call closed the queue and `false` if it was
    /// already closed, in which case nothing changes.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        let pending = state.items.len();
        drop(state);

        self.wake.notify_all();
        debug!(queue = %self.name, pending, "closed");
        self.record("close");
        true
    }

    /// Blocking iterator over items until the queue is closed and drained.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { queue: self }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            enqueued: state.enqueued,
            dequeued: state.dequeued,
            pending: state.items.len(),
            closed: state.closed,
        }
    }

    /// Every mutation under the lock is a single push, pop or flag store, so
    /// a panic elsewhere cannot leave the state torn and poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delivered(&self, pending: usize) {
        trace!(queue = %self.name, pending, "dequeued");
        self.record("dequeue");
    }

    fn record(&self, operation: &'static str) {
        self.operations.add(
            1,
            &[self.label.clone(), KeyValue::new("operation", operation)],
        );
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("pending", &stats.pending)
            .field("closed", &stats.closed)
            .finish()
    }
}

/// Iterator returned by [`Queue::iter`].
pub struct Iter<'a, T> {
    queue: &'a Queue<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.dequeue()
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a Queue<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_lock_keeps_serving() {
        let queue = Queue::named("poisoned");
        queue.enqueue(1).unwrap();

        std::thread::scope(|s| {
            let result = s
                .spawn(|| {
                    let _guard = queue.state.lock().unwrap();
                    panic!("poison the queue lock");
                })
                .join();
            assert!(result.is_err());
        });
        assert!(queue.state.is_poisoned());

        queue.enqueue(2).unwrap();
        assert_eq!(queue.dequeue(), Some(1));
        assert!(queue.close());
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn metric_label_carries_queue_name() {
        let queue: Queue<u8> = Queue::named("ingest");
        assert_eq!(queue.label.key.as_str(), "queue");
        assert_eq!(queue.label.value.as_str(), "ingest");

        let copy = queue.label.clone();
        assert_eq!(copy, queue.label);
    }

    #[test]
    fn counters_track_buffered_items() {
        let queue = Queue::new();
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        queue.dequeue().unwrap();
        queue.dequeue().unwrap();

        let state = queue.lock();
        assert_eq!(state.enqueued - state.dequeued, state.items.len() as u64);
        assert_eq!(state.items.len(), 3);
    }
}
