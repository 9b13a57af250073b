//! Non-blocking assignment commit queue.
//!
//! Deferred writes made by static code are recorded here and applied in
//! order once the active region of the current slot has drained. A write
//! recorded while committing lands in the next batch.

use std::cell::RefCell;

type Commit = Box<dyn FnOnce()>;

/// Pending deferred writes, applied in the order they were made.
#[derive(Default)]
pub struct DeferredQueue {
    pending: RefCell<Vec<Commit>>,
}

impl DeferredQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write to apply at the next commit.
    pub fn defer(&self, commit: impl FnOnce() + 'static) {
        self.pending.borrow_mut().push(Box::new(commit));
    }

    /// Applies every recorded write. Returns how many were applied.
    pub fn commit(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let count = batch.len();
        for commit in batch {
            commit();
        }
        count
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}
