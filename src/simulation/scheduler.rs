//! Single-threaded virtual-time event scheduler.
//!
//! Pending events live in an ordered map keyed by `(deadline, sequence)`, so
//! events fire in increasing time order and events sharing a deadline fire in
//! the order they were scheduled. The scheduler owns the notion of "now": it
//! advances only when the next event is popped.
//!
//! Every scheduled event yields a [`TimerHandle`]. Cancelling removes the entry
//! from the map, so a cancelled event can never be delivered. Cancelling a
//! handle that already fired (or was already cancelled) is a harmless no-op.

use std::collections::BTreeMap;

use super::time::{SimDuration, SimTime};

/// Identifies one scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    at: SimTime,
    id: u64,
}

impl TimerHandle {
    /// Deadline the event was scheduled for.
    pub fn deadline(&self) -> SimTime {
        self.at
    }
}

/// An event taken off the queue, together with the handle it was scheduled under.
#[derive(Debug)]
pub struct Fired<E> {
    pub at: SimTime,
    pub handle: TimerHandle,
    pub event: E,
}

pub struct Scheduler<E> {
    now: SimTime,
    next_id: u64,
    queue: BTreeMap<(SimTime, u64), E>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Scheduler {
            now: SimTime::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` to fire `delay` after the current time.
    pub fn schedule(&mut self, delay: SimDuration, event: E) -> TimerHandle {
        let at = self.now + delay;
        self.schedule_at(at, event)
    }

    /// Schedule `event` at an absolute instant. Instants in the past are clamped to now.
    pub fn schedule_at(&mut self, at: SimTime, event: E) -> TimerHandle {
        let at = at.max(self.now);
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((at, id), event);
        TimerHandle { at, id }
    }

    /// Remove a pending event.
    ///
    /// # Returns
    ///
    /// `true` if the event was still pending and has been removed, `false` if it
    /// had already fired or been cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(&(handle.at, handle.id)).is_some()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.contains_key(&(handle.at, handle.id))
    }

    /// Deadline of the earliest pending event, if any.
    pub fn peek_deadline(&self) -> Option<SimTime> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Pop the earliest pending event and advance the clock to its deadline.
    pub fn pop_next(&mut self) -> Option<Fired<E>> {
        let ((at, id), event) = self.queue.pop_first()?;
        self.now = at;
        Some(Fired {
            at,
            handle: TimerHandle { at, id },
            event,
        })
    }

    /// Move the clock forward to `at` without firing anything.
    ///
    /// Refused (returns `false`) if an event is pending before `at`.
    pub fn advance_to(&mut self, at: SimTime) -> bool {
        if self.peek_deadline().is_some_and(|next| next < at) {
            return false;
        }
        self.now = self.now.max(at);
        true
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

/// Holder for the single outstanding instance of a recurring timer.
///
/// Arming a slot replaces the previous handle; a fired handle that no longer
/// matches the slot is stale and must be ignored by the owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerSlot {
    handle: Option<TimerHandle>,
}

impl TimerSlot {
    pub fn arm(&mut self, handle: TimerHandle) {
        self.handle = Some(handle);
    }

    /// Cancel the outstanding timer, if any.
    pub fn cancel<E>(&mut self, scheduler: &mut Scheduler<E>) -> bool {
        match self.handle.take() {
            Some(handle) => scheduler.cancel(handle),
            None => false,
        }
    }

    /// Consume a fired handle. Returns `false` for stale handles.
    pub fn take_if_current(&mut self, fired: TimerHandle) -> bool {
        if self.handle == Some(fired) {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}
