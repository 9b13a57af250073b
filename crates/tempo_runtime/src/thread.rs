//! Thread-backed fork branches.
//!
//! When fork branches run as OS threads the parent blocks on a
//! [`ThreadJoin`] until enough branches have finished. A branch blocks on
//! simulation time through a [`SimClock`] or on value changes through
//! [`MonitoredValue`]s, both via [`BranchContext`].
//!
//! Cancellation is cooperative: every wait loop checks the exit flag, and
//! [`BranchThread::request_exit`] wakes a branch blocked in one.

use crate::error::RuntimeError;
use crate::timed_queue::Ticks;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};

/// Counts finished branches and wakes the parent once `expected` are in.
pub struct ThreadJoin {
    expected: usize,
    counter: Mutex<usize>,
    cv: Condvar,
    exit: AtomicBool,
}

impl ThreadJoin {
    /// A join released after `expected` completions: the branch count for
    /// `join`, one for `join_any`.
    pub fn new(expected: usize) -> Arc<Self> {
        Arc::new(Self {
            expected,
            counter: Mutex::new(0),
            cv: Condvar::new(),
            exit: AtomicBool::new(false),
        })
    }

    /// Records one finished branch.
    pub fn joined(&self) {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        if *counter == self.expected {
            self.cv.notify_all();
        }
    }

    /// Branches finished so far.
    pub fn completed(&self) -> usize {
        *self.counter.lock().unwrap()
    }

    /// Blocks until `expected` branches finished or an exit is requested.
    /// Returns `true` if the join completed.
    pub fn wait(&self) -> bool {
        let mut counter = self.counter.lock().unwrap();
        while !self.should_exit() && *counter < self.expected {
            counter = self.cv.wait(counter).unwrap();
        }
        *counter >= self.expected
    }

    /// Releases any parent blocked in [`wait`](Self::wait).
    pub fn request_exit(&self) {
        let _guard = self.counter.lock().unwrap();
        self.exit.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }

    /// Returns `true` once an exit was requested.
    pub fn should_exit(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }
}

/// Wakes one branch thread.
struct Wakeup {
    lock: Mutex<()>,
    cv: Condvar,
}

impl Wakeup {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: Mutex::new(()),
            cv: Condvar::new(),
        })
    }

    fn notify(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cv.notify_all();
    }
}

/// Branch threads blocked on a watched value.
#[derive(Default)]
pub struct Watchers(Mutex<Vec<Weak<Wakeup>>>);

impl Watchers {
    fn subscribe(&self, wakeup: &Arc<Wakeup>) {
        let mut list = self.0.lock().unwrap();
        list.retain(|w| w.strong_count() > 0);
        if !list.iter().any(|w| w.as_ptr() == Arc::as_ptr(wakeup)) {
            list.push(Arc::downgrade(wakeup));
        }
    }

    fn notify(&self) {
        let list: Vec<_> = self.0.lock().unwrap().iter().filter_map(Weak::upgrade).collect();
        for wakeup in list {
            wakeup.notify();
        }
    }
}

/// Something a branch thread can block on until it changes.
pub trait Watched {
    /// The threads to wake on a change.
    fn watchers(&self) -> &Watchers;
}

/// A value shared with branch threads that wakes them when written.
pub struct MonitoredValue<T> {
    value: Mutex<T>,
    watchers: Watchers,
}

impl<T: Clone> MonitoredValue<T> {
    /// Creates the value.
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            watchers: Watchers::default(),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.value.lock().unwrap().clone()
    }

    /// Stores `value` and wakes every subscribed branch.
    pub fn set(&self, value: T) {
        *self.value.lock().unwrap() = value;
        self.watchers.notify();
    }
}

impl<T> Watched for MonitoredValue<T> {
    fn watchers(&self) -> &Watchers {
        &self.watchers
    }
}

/// Simulation time as seen by branch threads.
#[derive(Default)]
pub struct SimClock {
    now: Mutex<Ticks>,
    watchers: Watchers,
}

impl SimClock {
    /// A clock at time 0.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The current time.
    pub fn now(&self) -> Ticks {
        *self.now.lock().unwrap()
    }

    /// Moves time forward to `time`, waking branches waiting on it.
    ///
    /// # Panics
    ///
    /// Panics if `time` is before the current time.
    pub fn advance_to(&self, time: Ticks) {
        {
            let mut now = self.now.lock().unwrap();
            assert!(time >= *now, "time went backwards: {time} < {now}");
            *now = time;
        }
        log::trace!("thread clock at t={time}");
        self.watchers.notify();
    }
}

impl Watched for SimClock {
    fn watchers(&self) -> &Watchers {
        &self.watchers
    }
}

/// Counts the branch as joined when its thread ends, panic or not.
struct JoinOnDrop(Option<Arc<ThreadJoin>>);

impl Drop for JoinOnDrop {
    fn drop(&mut self) {
        if let Some(join) = &self.0 {
            join.joined();
        }
    }
}

/// What a running branch can see of its thread.
pub struct BranchContext {
    exit: Arc<AtomicBool>,
    wakeup: Arc<Wakeup>,
}

impl BranchContext {
    /// Returns `true` once the branch has been asked to stop.
    pub fn should_exit(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    /// Blocks until `pred` holds, re-checking it whenever one of `watched`
    /// changes. Returns `false` if the branch was asked to exit first.
    pub fn wait_until(&self, mut pred: impl FnMut() -> bool, watched: &[&dyn Watched]) -> bool {
        for value in watched {
            value.watchers().subscribe(&self.wakeup);
        }
        let mut guard = self.wakeup.lock.lock().unwrap();
        loop {
            if self.should_exit() {
                return false;
            }
            if pred() {
                return true;
            }
            guard = self.wakeup.cv.wait(guard).unwrap();
        }
    }

    /// Blocks until `clock` reaches `time`. Returns `false` if the branch
    /// was asked to exit first.
    pub fn wait_for_time(&self, clock: &SimClock, time: Ticks) -> bool {
        self.wait_until(|| clock.now() >= time, &[clock as &dyn Watched])
    }
}

/// A fork branch running on its own OS thread.
pub struct BranchThread {
    name: String,
    handle: JoinHandle<()>,
    exit: Arc<AtomicBool>,
    wakeup: Arc<Wakeup>,
}

impl BranchThread {
    /// Starts `body` on a new thread, reporting to `join` when it ends.
    pub fn spawn(
        name: impl Into<String>,
        join: Option<Arc<ThreadJoin>>,
        body: impl FnOnce(&BranchContext) + Send + 'static,
    ) -> Result<Self, RuntimeError> {
        let name = name.into();
        let exit = Arc::new(AtomicBool::new(false));
        let wakeup = Wakeup::new();
        let cx = BranchContext {
            exit: Arc::clone(&exit),
            wakeup: Arc::clone(&wakeup),
        };
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _joined = JoinOnDrop(join);
                body(&cx);
            })
            .map_err(|source| RuntimeError::Spawn {
                name: name.clone(),
                source,
            })?;
        log::trace!("started branch thread `{name}`");
        Ok(Self {
            name,
            handle,
            exit,
            wakeup,
        })
    }

    /// The thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the branch to stop at its next check, waking it if it is
    /// blocked in a wait.
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::SeqCst);
        self.wakeup.notify();
    }

    /// Returns `true` once the branch body has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread to end.
    pub fn join(self) -> Result<(), RuntimeError> {
        self.handle
            .join()
            .map_err(|_| RuntimeError::BranchPanicked { name: self.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn join_waits_for_every_branch() {
        let join = ThreadJoin::new(3);
        let branches: Vec<_> = (0..3u64)
            .map(|i| {
                BranchThread::spawn(format!("b{i}"), Some(Arc::clone(&join)), move |_| {
                    thread::sleep(Duration::from_millis(5 * i));
                })
                .unwrap()
            })
            .collect();
        assert!(join.wait());
        assert_eq!(join.completed(), 3);
        for branch in branches {
            branch.join().unwrap();
        }
    }

    #[test]
    fn join_any_is_released_by_the_first_branch() {
        let join = ThreadJoin::new(1);
        let fast = BranchThread::spawn("fast", Some(Arc::clone(&join)), |_| {}).unwrap();
        let slow = BranchThread::spawn("slow", Some(Arc::clone(&join)), |cx| {
            while !cx.should_exit() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert!(join.wait());
        assert!(!slow.is_finished());
        slow.request_exit();
        slow.join().unwrap();
        fast.join().unwrap();
        assert_eq!(join.completed(), 2);
    }

    #[test]
    fn request_exit_releases_the_parent() {
        let join = ThreadJoin::new(2);
        let waiter = {
            let join = Arc::clone(&join);
            thread::spawn(move || join.wait())
        };
        join.joined();
        join.request_exit();
        assert!(!waiter.join().unwrap());
        assert!(join.should_exit());
    }

    #[test]
    fn branch_waits_for_the_clock() {
        let clock = SimClock::new();
        let join = ThreadJoin::new(1);
        let woke_at = Arc::new(Mutex::new(None));
        let branch = {
            let (clock, woke_at) = (Arc::clone(&clock), Arc::clone(&woke_at));
            BranchThread::spawn("timed", Some(Arc::clone(&join)), move |cx| {
                if cx.wait_for_time(&clock, 10) {
                    *woke_at.lock().unwrap() = Some(clock.now());
                }
            })
            .unwrap()
        };
        clock.advance_to(5);
        thread::sleep(Duration::from_millis(10));
        assert!(!branch.is_finished());
        clock.advance_to(10);
        assert!(join.wait());
        branch.join().unwrap();
        assert_eq!(*woke_at.lock().unwrap(), Some(10));
    }

    #[test]
    fn branch_waits_for_a_value_change() {
        let value = Arc::new(MonitoredValue::new(0u32));
        let other = Arc::new(MonitoredValue::new(false));
        let branch = {
            let (value, other) = (Arc::clone(&value), Arc::clone(&other));
            BranchThread::spawn("watcher", None, move |cx| {
                let watched: [&dyn Watched; 2] = [&*value, &*other];
                assert!(cx.wait_until(|| value.get() == 3 && other.get(), &watched));
            })
            .unwrap()
        };
        for v in 1..=3 {
            value.set(v);
        }
        thread::sleep(Duration::from_millis(10));
        assert!(!branch.is_finished());
        other.set(true);
        branch.join().unwrap();
    }

    #[test]
    fn request_exit_wakes_a_blocked_branch() {
        let clock = SimClock::new();
        let reached = Arc::new(AtomicBool::new(true));
        let branch = {
            let (clock, reached) = (Arc::clone(&clock), Arc::clone(&reached));
            BranchThread::spawn("stuck", None, move |cx| {
                reached.store(cx.wait_for_time(&clock, 100), Ordering::SeqCst);
            })
            .unwrap()
        };
        thread::sleep(Duration::from_millis(5));
        branch.request_exit();
        branch.join().unwrap();
        assert!(!reached.load(Ordering::SeqCst));
        assert_eq!(clock.now(), 0);
    }

    #[test]
    #[should_panic(expected = "time went backwards")]
    fn clock_never_moves_back() {
        let clock = SimClock::new();
        clock.advance_to(3);
        clock.advance_to(2);
    }

    #[test]
    fn panicking_branch_still_counts_as_joined() {
        let join = ThreadJoin::new(1);
        let branch = BranchThread::spawn("boom", Some(Arc::clone(&join)), |_| panic!("boom")).unwrap();
        assert!(join.wait());
        let err = branch.join().unwrap_err();
        assert!(matches!(err, RuntimeError::BranchPanicked { ref name } if name == "boom"));
    }
}
