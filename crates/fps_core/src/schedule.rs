//! Cancelable deferred tasks driven by the simulation clock.
//!
//! A task scheduled with [`Scheduler::schedule`] runs once the clock
//! reaches its due time, unless it was canceled first. Cancellation is
//! idempotent and a canceled task is never returned by
//! [`Scheduler::drain_due`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::Fixed;

/// Token identifying one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw token value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Work the scheduler hands back when due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduledTask {
    /// A gun's reload animation has finished.
    ReloadComplete {
        /// The reloading gun.
        gun: EntityId,
        /// Whether the reload was tactical.
        tactical: bool,
    },
}

/// Deferred task queue ordered by due time, then by scheduling order.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    next_handle: u64,
    queue: BTreeMap<(Fixed, TimerHandle), ScheduledTask>,
    due_times: HashMap<TimerHandle, Fixed>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run `delay` seconds after `now`.
    pub fn schedule(&mut self, now: Fixed, delay: Fixed, task: ScheduledTask) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let due = now.saturating_add(delay.max(Fixed::ZERO));
        self.queue.insert((due, handle), task);
        self.due_times.insert(handle, due);
        handle
    }

    /// Cancel a pending task.
    ///
    /// Returns `true` if the task was still pending. Canceling an unknown,
    /// already-run or already-canceled handle is a no-op returning `false`.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.due_times.remove(&handle) {
            Some(due) => self.queue.remove(&(due, handle)).is_some(),
            None => false,
        }
    }

    /// Whether `handle` is still waiting to run.
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_times.contains_key(&handle)
    }

    /// Seconds left until `handle` runs, if it is pending.
    #[must_use]
    pub fn remaining(&self, handle: TimerHandle, now: Fixed) -> Option<Fixed> {
        self.due_times
            .get(&handle)
            .map(|due| (*due - now).max(Fixed::ZERO))
    }

    /// Remove and return every task due at or before `now`.
    pub fn drain_due(&mut self, now: Fixed) -> Vec<(TimerHandle, ScheduledTask)> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (time, handle) = *entry.key();
            if time > now {
                break;
            }
            let task = entry.remove();
            self.due_times.remove(&handle);
            due.push((handle, task));
        }
        due
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reload(gun: EntityId) -> ScheduledTask {
        ScheduledTask::ReloadComplete {
            gun,
            tactical: false,
        }
    }

    #[test]
    fn test_runs_when_due() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Fixed::ZERO, Fixed::from_num(2), reload(1));

        assert!(scheduler.drain_due(Fixed::from_num(1.5)).is_empty());
        assert!(scheduler.is_pending(handle));

        let due = scheduler.drain_due(Fixed::from_num(2));
        assert_eq!(due, vec![(handle, reload(1))]);
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_before_fire() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Fixed::ZERO, Fixed::ONE, reload(1));

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle), "second cancel is a no-op");
        assert!(scheduler.drain_due(Fixed::from_num(10)).is_empty());
    }

    #[test]
    fn test_cancel_after_run_is_noop() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Fixed::ZERO, Fixed::ONE, reload(1));
        assert_eq!(scheduler.drain_due(Fixed::ONE).len(), 1);
        assert!(!scheduler.cancel(handle));
    }

    #[test]
    fn test_order_by_due_then_schedule_order() {
        let mut scheduler = Scheduler::new();
        let late = scheduler.schedule(Fixed::ZERO, Fixed::from_num(3), reload(1));
        let first = scheduler.schedule(Fixed::ZERO, Fixed::ONE, reload(2));
        let second = scheduler.schedule(Fixed::ZERO, Fixed::ONE, reload(3));

        let order: Vec<_> = scheduler
            .drain_due(Fixed::from_num(5))
            .into_iter()
            .map(|(handle, _)| handle)
            .collect();
        assert_eq!(order, vec![first, second, late]);
    }

    #[test]
    fn test_remaining() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Fixed::ONE, Fixed::from_num(2), reload(1));
        assert_eq!(
            scheduler.remaining(handle, Fixed::from_num(2)),
            Some(Fixed::ONE)
        );
        scheduler.cancel(handle);
        assert_eq!(scheduler.remaining(handle, Fixed::from_num(2)), None);
    }
}
