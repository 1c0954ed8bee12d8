//! Bounded, blocking hand-off queue between block producers and the
//! decision thread.
//!
//! Producers never wait: a full or closed queue rejects the item and hands it
//! back. The single consumer waits on a condition variable until an item
//! arrives or the queue is closed and empty.
//!
//! The queue has its own lock, separate from the coordinator's, so a slow
//! consumer never holds up cache maintenance and vice versa.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Why an item was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The queue holds `capacity` items.
    Full,
    /// The queue was closed.
    Closed,
}

impl RejectReason {
    /// Returns the reason as a metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item the queue refused, returned to the producer.
#[derive(Debug, PartialEq, Eq)]
pub struct Rejected<T> {
    /// The refused item.
    pub item: T,
    /// Why it was refused.
    pub reason: RejectReason,
}

struct QueueState<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    count: usize,
    closed: bool,
}

/// Fixed-capacity FIFO ring with blocking dequeue.
///
/// # Example
///
/// ```rust
/// use fwnotify::services::{BoundedQueue, RejectReason};
///
/// let queue = BoundedQueue::new(1);
/// assert!(queue.enqueue("a").is_ok());
/// assert_eq!(queue.enqueue("b").unwrap_err().reason, RejectReason::Full);
///
/// queue.close();
/// assert_eq!(queue.dequeue(), Some("a"));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates an open, empty queue. A zero capacity is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity).map(|_| None).collect();
        Self {
            state: Mutex::new(QueueState {
                slots,
                head: 0,
                count: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Appends an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns the item with [`RejectReason::Full`] if the queue is at
    /// capacity, or [`RejectReason::Closed`] once [`Self::close`] was called.
    pub fn enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = self.lock();

        if state.closed {
            return Err(Rejected {
                item,
                reason: RejectReason::Closed,
            });
        }
        if state.count >= self.capacity {
            return Err(Rejected {
                item,
                reason: RejectReason::Full,
            });
        }

        let tail = (state.head + state.count) % self.capacity;
        state.slots[tail] = Some(item);
        state.count += 1;
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and empty, and on every call
    /// after that. Items queued before the close are still returned first.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        while state.count == 0 && !state.closed {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Self::pop(&mut state, self.capacity)
    }

    /// Removes every queued item without waiting.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let mut items = Vec::with_capacity(state.count);
        while let Some(item) = Self::pop(&mut state, self.capacity) {
            items.push(item);
        }
        items
    }

    /// Stops accepting items and wakes every waiting consumer. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
    }

    /// Returns true once [`Self::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn pop(state: &mut QueueState<T>, capacity: usize) -> Option<T> {
        if state.count == 0 {
            return None;
        }
        let item = state.slots[state.head].take();
        state.head = (state.head + 1) % capacity;
        state.count -= 1;
        item
    }

    // Every critical section leaves the ring consistent, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.count)
            .field("closed", &state.closed)
            .finish()
    }
}
