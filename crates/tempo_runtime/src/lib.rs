//! Runtime scheduling primitives for lowered designs.
//!
//! Code produced by `tempo_timing` relies on a small set of capabilities:
//! park a continuation until a future time, register it against a set of
//! events, fire an event, advance to the next pending time, and run or join
//! a spawned branch. This crate provides them.
//!
//! - [`TimedQueue`] and [`EventDispatcher`] are the shared building blocks;
//!   both release their lock before running a continuation
//! - [`Scheduler`] drives suspendable processes as futures on one thread,
//!   with [`Coroutine`] handles, [`JoinCounter`]s for forks, [`Signal`]s
//!   that fire edge events, and a [`DeferredQueue`] for non-blocking writes
//! - [`ThreadPool`], [`BranchThread`] and [`ThreadJoin`] back fork branches
//!   with OS threads instead; such a branch blocks on a [`SimClock`] or on
//!   [`MonitoredValue`]s
//!
//! # Usage
//!
//! ```
//! use tempo_runtime::Scheduler;
//!
//! let sched = Scheduler::default();
//! let s = sched.clone();
//! let _process = sched.spawn(async move {
//!     s.delay(5).await;
//! });
//! assert_eq!(sched.run_until(100), 5);
//! ```

#![warn(missing_docs)]

mod coroutine;
mod deferred;
mod dispatcher;
pub mod error;
mod join;
mod scheduler;
mod signal;
mod thread;
mod thread_pool;
mod timed_queue;

pub use coroutine::Coroutine;
pub use deferred::DeferredQueue;
pub use dispatcher::{EventDispatcher, EventId};
pub use error::RuntimeError;
pub use join::{JoinCounter, JoinWait};
pub use scheduler::{Delay, EventWait, Scheduler};
pub use signal::{EdgeEvents, Signal};
pub use thread::{
    BranchContext, BranchThread, MonitoredValue, SimClock, ThreadJoin, Watched, Watchers,
};
pub use thread_pool::ThreadPool;
pub use timed_queue::{Ticks, TimedQueue};
pub use tempo_config::WaitPolicy;
