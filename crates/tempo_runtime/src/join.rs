//! Join counters for coroutine fork branches.
//!
//! A `fork ... join` starts with a count equal to the number of branches,
//! a `join_any` with a count of one. Each branch decrements the counter
//! when it finishes; the parent waits until the count reaches zero.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct JoinState {
    remaining: Cell<usize>,
    waiters: RefCell<Vec<Waker>>,
}

/// A shared countdown that parents await and branches decrement.
#[derive(Clone)]
pub struct JoinCounter {
    state: Rc<JoinState>,
}

impl JoinCounter {
    /// Creates a counter expecting `count` completions.
    pub fn new(count: usize) -> Self {
        Self {
            state: Rc::new(JoinState {
                remaining: Cell::new(count),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Records one branch completion. Saturates at zero, so branches that
    /// finish after a `join_any` is released are harmless.
    pub fn done(&self) {
        let remaining = self.state.remaining.get().saturating_sub(1);
        self.state.remaining.set(remaining);
        if remaining == 0 {
            for waker in self.state.waiters.borrow_mut().drain(..) {
                waker.wake();
            }
        }
    }

    /// Completions still expected.
    pub fn remaining(&self) -> usize {
        self.state.remaining.get()
    }

    /// Resolves once the count reaches zero.
    pub fn wait(&self) -> JoinWait {
        JoinWait {
            state: Rc::clone(&self.state),
        }
    }
}

/// Future returned by [`JoinCounter::wait`].
pub struct JoinWait {
    state: Rc<JoinState>,
}

impl Future for JoinWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.state.remaining.get() == 0 {
            return Poll::Ready(());
        }
        self.state.waiters.borrow_mut().push(cx.waker().clone());
        Poll::Pending
    }
}
