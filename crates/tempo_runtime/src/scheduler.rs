//! Single-threaded cooperative executor for lowered processes.
//!
//! Every suspendable process or routine is a future. A future suspends only
//! at the scheduler's own awaitables: [`Scheduler::delay`] parks it in the
//! timed queue, [`Scheduler::wait`] in the event dispatcher, and a
//! [`Coroutine`] or [`JoinWait`](crate::JoinWait) on its callee.
//!
//! One time slot runs as follows:
//! 1. reset event values left over from the previous slot
//! 2. wake everything due in the timed queue
//! 3. poll ready tasks, resume waiters of triggered events, commit deferred
//!    writes and fire the deferred event, until nothing is runnable
//!
//! [`Scheduler::advance`] then moves time to the next queued wake time.

use crate::coroutine::{Coroutine, CoroutineState};
use crate::deferred::DeferredQueue;
use crate::dispatcher::{EventDispatcher, EventId};
use crate::timed_queue::{Ticks, TimedQueue};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use tempo_config::{RuntimeConfig, WaitPolicy};

type Task = Pin<Box<dyn Future<Output = ()>>>;
type RunQueue = Arc<Mutex<VecDeque<u64>>>;

/// Requeues its task when woken.
struct TaskWaker {
    task: u64,
    run_queue: RunQueue,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.run_queue.lock().unwrap().push_back(self.task);
    }
}

/// What a timed or event wait resumes: the task's waker plus a flag the
/// awaiting future checks, so a spurious poll does not resume it early.
struct Resume {
    waker: Waker,
    fired: Rc<Cell<bool>>,
}

impl Resume {
    fn run(self) {
        self.fired.set(true);
        self.waker.wake();
    }
}

struct Inner {
    now: Cell<Ticks>,
    next_task: Cell<u64>,
    next_event: Cell<u32>,
    tasks: RefCell<BTreeMap<u64, Task>>,
    run_queue: RunQueue,
    timed: TimedQueue<Resume>,
    events: EventDispatcher<Resume>,
    deferred: DeferredQueue,
    deferred_event: EventId,
}

/// The cooperative executor. Cloning yields another handle to the same
/// scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(WaitPolicy::default())
    }
}

impl Scheduler {
    /// Creates a scheduler at time zero.
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            inner: Rc::new(Inner {
                now: Cell::new(0),
                next_task: Cell::new(0),
                next_event: Cell::new(1),
                tasks: RefCell::new(BTreeMap::new()),
                run_queue: Arc::new(Mutex::new(VecDeque::new())),
                timed: TimedQueue::new(),
                events: EventDispatcher::new(policy),
                deferred: DeferredQueue::new(),
                deferred_event: EventId::from_raw(0),
            }),
        }
    }

    /// Creates a scheduler configured from the `[runtime]` table.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.wait_policy)
    }

    /// Current simulation time.
    pub fn now(&self) -> Ticks {
        self.inner.now.get()
    }

    /// Allocates a fresh event.
    pub fn new_event(&self) -> EventId {
        let raw = self.inner.next_event.get();
        self.inner.next_event.set(raw + 1);
        EventId::from_raw(raw)
    }

    /// The event driven after each active round to apply deferred
    /// assignments made from suspendable code.
    pub fn deferred_event(&self) -> EventId {
        self.inner.deferred_event
    }

    /// Suspends the caller for `ticks`. A zero delay yields to everything
    /// already runnable in the current slot.
    pub fn delay(&self, ticks: Ticks) -> Delay {
        Delay {
            scheduler: self.clone(),
            until: self.now().saturating_add(ticks),
            fired: None,
        }
    }

    /// Suspends the caller until `events` fire. An empty set resolves
    /// immediately.
    pub fn wait(&self, events: &[EventId]) -> EventWait {
        EventWait {
            scheduler: self.clone(),
            events: events.to_vec(),
            fired: None,
        }
    }

    /// Fires `event`.
    pub fn trigger(&self, event: EventId) {
        log::trace!("t={}: trigger event {}", self.now(), event.as_raw());
        self.inner.events.trigger(event);
    }

    /// Returns `true` if `event` fired in the current slot.
    pub fn is_triggered(&self, event: EventId) -> bool {
        self.inner.events.is_triggered(event)
    }

    /// Withdraws every waiter on `event`.
    pub fn cancel(&self, event: EventId) {
        self.inner.events.cancel(event);
    }

    /// Records a deferred write from static code.
    pub fn defer(&self, commit: impl FnOnce() + 'static) {
        self.inner.deferred.defer(commit);
    }

    /// Starts `future` as a new task. It first runs the next time ready
    /// tasks are polled.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) -> Coroutine {
        let state = Rc::new(CoroutineState::default());
        let finished = Rc::clone(&state);
        let task = async move {
            future.await;
            finished.finish();
        };
        let id = self.inner.next_task.get();
        self.inner.next_task.set(id + 1);
        self.inner.tasks.borrow_mut().insert(id, Box::pin(task));
        self.inner.run_queue.lock().unwrap().push_back(id);
        Coroutine { state }
    }

    /// Number of tasks that have not finished.
    pub fn live_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Resumes waiters of events triggered so far.
    pub fn resume_triggered(&self) {
        self.inner.events.resume_triggered(Resume::run);
    }

    /// Runs the current slot until nothing is runnable.
    pub fn run_ready(&self) {
        loop {
            self.poll_ready();
            let committed = self.inner.deferred.commit();
            self.inner
                .events
                .resume_triggered_with(self.inner.deferred_event, Resume::run);
            let idle = self.inner.run_queue.lock().unwrap().is_empty();
            if idle && committed == 0 && self.inner.deferred.is_empty() {
                break;
            }
        }
    }

    fn poll_ready(&self) {
        loop {
            let Some(id) = self.inner.run_queue.lock().unwrap().pop_front() else {
                break;
            };
            let Some(mut task) = self.inner.tasks.borrow_mut().remove(&id) else {
                continue;
            };
            let waker = Waker::from(Arc::new(TaskWaker {
                task: id,
                run_queue: Arc::clone(&self.inner.run_queue),
            }));
            let mut cx = Context::from_waker(&waker);
            if task.as_mut().poll(&mut cx).is_pending() {
                self.inner.tasks.borrow_mut().insert(id, task);
            }
        }
    }

    /// Moves to the next queued wake time and runs that slot.
    ///
    /// Returns `false` when nothing is queued; time does not move then.
    /// Triggered flags are cleared only when the time actually moves, so a
    /// zero delay stays within the slot.
    pub fn advance(&self) -> bool {
        let Some(next) = self.inner.timed.earliest_time() else {
            return false;
        };
        let now = self.now();
        assert!(next >= now, "time went backwards: {next} < {now}");
        if next > now {
            self.inner.now.set(next);
            self.inner.events.reset_triggered();
        }
        let woken = self.inner.timed.activate(next, Resume::run);
        log::trace!("t={next}: {woken} timed continuations due");
        self.run_ready();
        true
    }

    /// Runs the current slot, then every slot up to and including `limit`.
    /// Returns the time reached.
    pub fn run_until(&self, limit: Ticks) -> Ticks {
        self.run_ready();
        while self.inner.timed.earliest_time().is_some_and(|t| t <= limit) {
            self.advance();
        }
        log::debug!(
            "scheduler stopped at t={} with {} live tasks",
            self.now(),
            self.live_tasks()
        );
        self.now()
    }
}

/// Future returned by [`Scheduler::delay`].
pub struct Delay {
    scheduler: Scheduler,
    until: Ticks,
    fired: Option<Rc<Cell<bool>>>,
}

impl Future for Delay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(fired) = &self.fired {
            return if fired.get() { Poll::Ready(()) } else { Poll::Pending };
        }
        let fired = Rc::new(Cell::new(false));
        self.scheduler.inner.timed.push(
            self.until,
            Resume {
                waker: cx.waker().clone(),
                fired: Rc::clone(&fired),
            },
        );
        self.fired = Some(fired);
        Poll::Pending
    }
}

/// Future returned by [`Scheduler::wait`].
pub struct EventWait {
    scheduler: Scheduler,
    events: Vec<EventId>,
    fired: Option<Rc<Cell<bool>>>,
}

impl Future for EventWait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.events.is_empty() {
            return Poll::Ready(());
        }
        if let Some(fired) = &self.fired {
            return if fired.get() { Poll::Ready(()) } else { Poll::Pending };
        }
        let fired = Rc::new(Cell::new(false));
        self.scheduler.inner.events.insert(
            self.events.iter().copied(),
            Resume {
                waker: cx.waker().clone(),
                fired: Rc::clone(&fired),
            },
        );
        self.fired = Some(fired);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_advances_time() {
        let sched = Scheduler::default();
        let seen = Rc::new(Cell::new(None));
        let s = sched.clone();
        let out = Rc::clone(&seen);
        let _task = sched.spawn(async move {
            s.delay(7).await;
            out.set(Some(s.now()));
        });
        assert_eq!(sched.run_until(100), 7);
        assert_eq!(seen.get(), Some(7));
        assert_eq!(sched.live_tasks(), 0);
        assert!(!sched.advance());
    }

    #[test]
    fn zero_delay_yields_within_the_slot() {
        let sched = Scheduler::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (s, o) = (sched.clone(), Rc::clone(&order));
        let _a = sched.spawn(async move {
            o.borrow_mut().push("a1");
            s.delay(0).await;
            o.borrow_mut().push("a2");
        });
        let o = Rc::clone(&order);
        let _b = sched.spawn(async move {
            o.borrow_mut().push("b");
        });
        sched.run_until(0);
        assert_eq!(*order.borrow(), vec!["a1", "b", "a2"]);
        assert_eq!(sched.now(), 0);
    }

    #[test]
    fn zero_delay_keeps_triggered_flags_of_the_slot() {
        let sched = Scheduler::default();
        let ev = sched.new_event();
        let seen = Rc::new(Cell::new(None));
        let (s, out) = (sched.clone(), Rc::clone(&seen));
        let _task = sched.spawn(async move {
            s.trigger(ev);
            s.delay(0).await;
            out.set(Some(s.is_triggered(ev)));
            s.delay(1).await;
        });
        assert_eq!(sched.run_until(0), 0);
        assert_eq!(seen.get(), Some(true));
        sched.run_until(1);
        assert!(!sched.is_triggered(ev));
    }

    #[test]
    fn awaiting_a_finished_coroutine_resolves_immediately() {
        let sched = Scheduler::default();
        let callee = sched.spawn(async {});
        sched.run_ready();
        assert!(callee.is_finished());
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _caller = sched.spawn(async move {
            callee.await;
            d.set(true);
        });
        sched.run_ready();
        assert!(done.get());
    }

    #[test]
    fn caller_waits_for_a_running_coroutine() {
        let sched = Scheduler::default();
        let s = sched.clone();
        let callee = sched.spawn(async move { s.delay(3).await });
        let s = sched.clone();
        let finished_at = Rc::new(Cell::new(0));
        let f = Rc::clone(&finished_at);
        let _caller = sched.spawn(async move {
            callee.await;
            f.set(s.now());
        });
        sched.run_until(10);
        assert_eq!(finished_at.get(), 3);
    }

    #[test]
    fn cancelled_event_never_resumes_its_waiter() {
        let sched = Scheduler::default();
        let ev = sched.new_event();
        let resumed = Rc::new(Cell::new(false));
        let (s, r) = (sched.clone(), Rc::clone(&resumed));
        let _waiter = sched.spawn(async move {
            s.wait(&[ev]).await;
            r.set(true);
        });
        sched.run_ready();
        sched.cancel(ev);
        sched.trigger(ev);
        sched.run_ready();
        assert!(!resumed.get());
        assert_eq!(sched.live_tasks(), 1);
    }

    #[test]
    fn events_are_distinct_from_the_deferred_event() {
        let sched = Scheduler::default();
        let a = sched.new_event();
        let b = sched.new_event();
        assert_ne!(a, b);
        assert_ne!(a, sched.deferred_event());
    }
}
