//! Value cells that fire their edge events on every write.
//!
//! A write stores the new value first and only then fires the events, so a
//! resumed waiter always observes the value that woke it. A value counts as
//! high when it differs from `T::default()`.

use crate::dispatcher::EventId;
use crate::scheduler::Scheduler;
use std::cell::Cell;

/// The edge events attached to a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeEvents {
    /// Fired on a low-to-high transition.
    pub posedge: Option<EventId>,
    /// Fired on a high-to-low transition.
    pub negedge: Option<EventId>,
    /// Fired on any change of value.
    pub anyedge: Option<EventId>,
}

impl EdgeEvents {
    /// Allocates all three edge events from `scheduler`.
    pub fn all(scheduler: &Scheduler) -> Self {
        Self {
            posedge: Some(scheduler.new_event()),
            negedge: Some(scheduler.new_event()),
            anyedge: Some(scheduler.new_event()),
        }
    }
}

/// A variable observed by waiting processes.
pub struct Signal<T> {
    value: Cell<T>,
    events: EdgeEvents,
}

impl<T: Copy + PartialEq + Default> Signal<T> {
    /// An untracked signal; writes fire nothing.
    pub fn new(value: T) -> Self {
        Self::with_events(value, EdgeEvents::default())
    }

    /// A signal firing `events` on its transitions.
    pub fn with_events(value: T, events: EdgeEvents) -> Self {
        Self {
            value: Cell::new(value),
            events,
        }
    }

    /// A signal with freshly allocated posedge, negedge and anyedge events.
    pub fn tracked(value: T, scheduler: &Scheduler) -> Self {
        Self::with_events(value, EdgeEvents::all(scheduler))
    }

    /// The current value.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// The attached edge events.
    pub fn events(&self) -> EdgeEvents {
        self.events
    }

    /// Stores `value`, then fires the edge events its transition matches.
    pub fn set(&self, scheduler: &Scheduler, value: T) {
        let prev = self.value.replace(value);
        if prev == value {
            return;
        }
        let (was_high, is_high) = (prev != T::default(), value != T::default());
        if !was_high && is_high {
            if let Some(ev) = self.events.posedge {
                scheduler.trigger(ev);
            }
        }
        if was_high && !is_high {
            if let Some(ev) = self.events.negedge {
                scheduler.trigger(ev);
            }
        }
        if let Some(ev) = self.events.anyedge {
            scheduler.trigger(ev);
        }
    }
}
