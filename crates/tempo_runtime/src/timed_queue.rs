//! Continuations waiting for a point in simulation time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// Simulation time in precision ticks.
pub type Ticks = u64;

/// One queued continuation. Ordered by wake time, then by push order.
struct Entry<T> {
    time: Ticks,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

struct Inner<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

/// A min-queue of continuations keyed by wake time.
///
/// Entries sharing a wake time come out in the order they were pushed.
/// The queue may be shared between threads; the lock is never held while a
/// continuation runs.
pub struct TimedQueue<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for TimedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimedQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Schedules `item` to run at `time`.
    pub fn push(&self, time: Ticks, item: T) {
        let mut inner = self.inner.lock().unwrap();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Entry { time, seq, item }));
    }

    /// Runs every entry due at or before `now`, earliest first.
    ///
    /// Entries pushed by `run` that are already due run in the same call.
    /// Returns how many entries ran.
    pub fn activate(&self, now: Ticks, mut run: impl FnMut(T)) -> usize {
        let mut count = 0;
        while let Some(item) = self.pop_due(now) {
            run(item);
            count += 1;
        }
        count
    }

    fn pop_due(&self, now: Ticks) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let due = inner
            .heap
            .peek()
            .is_some_and(|Reverse(entry)| entry.time <= now);
        if due {
            inner.heap.pop().map(|Reverse(entry)| entry.item)
        } else {
            None
        }
    }

    /// The wake time of the next entry, if any.
    pub fn earliest_time(&self) -> Option<Ticks> {
        self.inner
            .lock()
            .unwrap()
            .heap
            .peek()
            .map(|Reverse(entry)| entry.time)
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().heap.is_empty()
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }
}
