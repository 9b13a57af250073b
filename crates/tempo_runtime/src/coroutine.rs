//! Handles to spawned coroutines.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Completion state shared between a spawned task and its handle.
#[derive(Default)]
pub(crate) struct CoroutineState {
    done: Cell<bool>,
    awaiter: RefCell<Option<Waker>>,
}

impl CoroutineState {
    /// Marks the coroutine finished and resumes whoever awaits it.
    pub(crate) fn finish(&self) {
        self.done.set(true);
        if let Some(waker) = self.awaiter.borrow_mut().take() {
            waker.wake();
        }
    }
}

/// An awaitable handle to a coroutine started with
/// [`Scheduler::spawn`](crate::Scheduler::spawn).
///
/// Awaiting the handle suspends the caller until the coroutine returns. A
/// coroutine that already finished resolves immediately, so the order in
/// which callee completion and caller await happen does not matter.
/// Dropping the handle detaches the coroutine; it keeps running.
#[must_use = "dropping the handle detaches the coroutine"]
pub struct Coroutine {
    pub(crate) state: Rc<CoroutineState>,
}

impl Coroutine {
    /// Returns `true` once the coroutine has run to completion.
    pub fn is_finished(&self) -> bool {
        self.state.done.get()
    }
}

impl Future for Coroutine {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.state.done.get() {
            return Poll::Ready(());
        }
        *self.state.awaiter.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
