//! Event-set to waiter dispatch.
//!
//! A continuation registers against a set of events and is resumed once
//! the set fires (per the configured [`WaitPolicy`]). Each registration is
//! delivered at most once; a waiter that wants the next firing registers
//! again.
//!
//! Triggering an event only records it. Waiters move to the ready list the
//! next time triggered events are processed, so an event fired and awaited
//! within one slot resumes exactly the waiters registered before it fired.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tempo_config::WaitPolicy;

/// Identifies one runtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u32);

impl EventId {
    /// Wraps a raw event number.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw event number.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

struct Registration<T> {
    events: BTreeSet<EventId>,
    /// Events of the set that have not fired yet.
    pending: BTreeSet<EventId>,
    cont: T,
}

struct Inner<T> {
    registrations: BTreeMap<u64, Registration<T>>,
    /// Secondary index: which registrations wait on each event.
    by_event: BTreeMap<EventId, BTreeSet<u64>>,
    next_id: u64,
    triggered: Vec<EventId>,
    /// Events whose value is set until the next reset.
    fired: BTreeSet<EventId>,
    ready: Vec<T>,
}

impl<T> Inner<T> {
    fn remove(&mut self, id: u64) -> Option<Registration<T>> {
        let reg = self.registrations.remove(&id)?;
        for event in &reg.events {
            if let Some(ids) = self.by_event.get_mut(event) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_event.remove(event);
                }
            }
        }
        Some(reg)
    }

    fn is_set_waited_on(&self, events: &BTreeSet<EventId>) -> bool {
        let Some(first) = events.first() else {
            return false;
        };
        self.by_event.get(first).is_some_and(|ids| {
            ids.iter()
                .any(|id| self.registrations.get(id).is_some_and(|r| r.events == *events))
        })
    }

    /// Moves the waiters of every triggered event to the ready list.
    fn ready_triggered(&mut self, policy: WaitPolicy) {
        let triggered = std::mem::take(&mut self.triggered);
        for event in triggered {
            let ids: Vec<u64> = self
                .by_event
                .get(&event)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            for id in ids {
                let done = match self.registrations.get_mut(&id) {
                    Some(reg) => {
                        reg.pending.remove(&event);
                        policy == WaitPolicy::Any || reg.pending.is_empty()
                    }
                    None => false,
                };
                if done {
                    if let Some(reg) = self.remove(id) {
                        self.ready.push(reg.cont);
                    }
                }
            }
        }
    }
}

/// Maps event sets to the continuations waiting on them.
pub struct EventDispatcher<T> {
    policy: WaitPolicy,
    inner: Mutex<Inner<T>>,
}

impl<T> Default for EventDispatcher<T> {
    fn default() -> Self {
        Self::new(WaitPolicy::default())
    }
}

impl<T> EventDispatcher<T> {
    /// Creates an empty dispatcher.
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                registrations: BTreeMap::new(),
                by_event: BTreeMap::new(),
                next_id: 0,
                triggered: Vec::new(),
                fired: BTreeSet::new(),
                ready: Vec::new(),
            }),
        }
    }

    /// The wake-up policy for multi-event sets.
    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Registers `cont` to be resumed when `events` fire.
    ///
    /// If the same set is already being waited on, pending triggers are
    /// delivered to the earlier waiters first so the new registration does
    /// not observe them.
    pub fn insert(&self, events: impl IntoIterator<Item = EventId>, cont: T) {
        let events: BTreeSet<EventId> = events.into_iter().collect();
        let mut inner = self.inner.lock().unwrap();
        if inner.is_set_waited_on(&events) {
            inner.ready_triggered(self.policy);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        for &event in &events {
            inner.by_event.entry(event).or_default().insert(id);
        }
        inner.registrations.insert(
            id,
            Registration {
                pending: events.clone(),
                events,
                cont,
            },
        );
    }

    /// Fires `event`: sets its value and queues its waiters for resumption.
    pub fn trigger(&self, event: EventId) {
        let mut inner = self.inner.lock().unwrap();
        inner.fired.insert(event);
        inner.triggered.push(event);
    }

    /// Returns `true` if `event` fired since the last reset.
    pub fn is_triggered(&self, event: EventId) -> bool {
        self.inner.lock().unwrap().fired.contains(&event)
    }

    /// Resumes waiters of triggered events until no more become ready.
    ///
    /// `run` is called with the lock released, so it may trigger events or
    /// register new waiters.
    pub fn resume_triggered(&self, mut run: impl FnMut(T)) {
        self.inner.lock().unwrap().ready_triggered(self.policy);
        loop {
            let ready = std::mem::take(&mut self.inner.lock().unwrap().ready);
            if ready.is_empty() {
                break;
            }
            for cont in ready {
                run(cont);
            }
            self.inner.lock().unwrap().ready_triggered(self.policy);
        }
    }

    /// Like [`resume_triggered`](Self::resume_triggered), but also fires
    /// `deferred` after each round, releasing the waiters that apply
    /// deferred assignments. Repeats while that produces new work.
    pub fn resume_triggered_with(&self, deferred: EventId, mut run: impl FnMut(T)) {
        loop {
            self.resume_triggered(&mut run);
            self.trigger(deferred);
            let mut inner = self.inner.lock().unwrap();
            inner.ready_triggered(self.policy);
            if inner.ready.is_empty() {
                break;
            }
        }
    }

    /// Clears the value of every event fired in the previous time slot.
    pub fn reset_triggered(&self) {
        self.inner.lock().unwrap().fired.clear();
    }

    /// Withdraws every waiter on `event` and clears its value.
    ///
    /// Waiters registered on a set containing `event` are dropped entirely.
    pub fn cancel(&self, event: EventId) {
        let mut inner = self.inner.lock().unwrap();
        let ids: Vec<u64> = inner
            .by_event
            .get(&event)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        for id in ids {
            inner.remove(id);
        }
        inner.fired.remove(&event);
        inner.triggered.retain(|&e| e != event);
    }

    /// Number of registrations still waiting.
    pub fn waiting(&self) -> usize {
        self.inner.lock().unwrap().registrations.len()
    }

    /// Returns `true` if some registration waits on `event`.
    pub fn is_waited_on(&self, event: EventId) -> bool {
        self.inner.lock().unwrap().by_event.contains_key(&event)
    }
}
