//! Delayed, cancellable task queue driven by an external frame tick.
//!
//! Tasks are keyed by `(fire_at, sequence)` so firing order is by fire time
//! ascending and insertion order among equal fire times. A tick only fires
//! tasks that were already queued when the tick began; anything a firing task
//! schedules waits for a later tick even when its fire time has passed.

use alloc::collections::BTreeMap;
use core::cmp::Ordering;

use crate::clock::Instant;

/// Ordering key for a queued task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskKey<I = Instant> {
    /// When the task becomes due.
    pub fire_at: I,
    /// Insertion sequence used to break fire-time ties.
    pub sequence: u64,
}

impl<I: Ord> Ord for TaskKey<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.fire_at.cmp(&other.fire_at) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ord => ord,
        }
    }
}

impl<I: Ord> PartialOrd for TaskKey<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle returned by [`TaskScheduler::schedule`] for targeted cancellation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskHandle<I = Instant> {
    key: TaskKey<I>,
}

impl<I: Copy> TaskHandle<I> {
    /// Fire time the task was scheduled for.
    #[must_use]
    pub const fn fire_at(&self) -> I {
        self.key.fire_at
    }
}

#[derive(Clone, Debug)]
struct ScheduledTask<C, A> {
    category: C,
    action: A,
}

/// Snapshot taken at the start of a tick.
///
/// Only tasks with a sequence below `watermark` are eligible during the tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickCursor<I = Instant> {
    now: I,
    watermark: u64,
}

impl<I: Copy> TickCursor<I> {
    #[must_use]
    pub const fn now(&self) -> I {
        self.now
    }
}

/// Ordered delayed-task queue with bulk cancellation by category.
#[derive(Clone, Debug)]
pub struct TaskScheduler<C, A, I = Instant> {
    tasks: BTreeMap<TaskKey<I>, ScheduledTask<C, A>>,
    next_sequence: u64,
}

impl<C, A, I> TaskScheduler<C, A, I>
where
    C: Copy + Eq,
    I: Copy + Ord,
{
    /// Creates an empty scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Queues `action` under `category` to fire once `fire_at` is reached.
    pub fn schedule(&mut self, fire_at: I, category: C, action: A) -> TaskHandle<I> {
        let key = TaskKey {
            fire_at,
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.tasks.insert(key, ScheduledTask { category, action });
        TaskHandle { key }
    }

    /// Removes a single task without firing it.
    pub fn cancel(&mut self, handle: TaskHandle<I>) -> Option<A> {
        self.tasks.remove(&handle.key).map(|task| task.action)
    }

    /// Removes every pending task tagged with `category`, returning how many were dropped.
    pub fn cancel_category(&mut self, category: C) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.category != category);
        before - self.tasks.len()
    }

    /// Removes every pending task whose category satisfies `predicate`.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&C) -> bool,
    {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !predicate(&task.category));
        before - self.tasks.len()
    }

    /// Number of pending tasks tagged with `category`.
    pub fn pending_in(&self, category: C) -> usize {
        self.tasks
            .values()
            .filter(|task| task.category == category)
            .count()
    }

    /// Number of pending tasks whose category satisfies `predicate`.
    pub fn pending_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&C) -> bool,
    {
        self.tasks
            .values()
            .filter(|task| predicate(&task.category))
            .count()
    }

    /// Earliest pending fire time, if any task is queued.
    pub fn next_fire_at(&self) -> Option<I> {
        self.tasks.first_key_value().map(|(key, _)| key.fire_at)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Opens a tick at `now`, freezing the set of eligible tasks.
    pub fn begin_tick(&self, now: I) -> TickCursor<I> {
        TickCursor {
            now,
            watermark: self.next_sequence,
        }
    }

    /// Removes and returns the next task due under `cursor`.
    ///
    /// Tasks are taken one at a time so cancellations made while handling a
    /// task apply to the rest of the tick.
    pub fn pop_due(&mut self, cursor: &TickCursor<I>) -> Option<(C, A)> {
        let key = self
            .tasks
            .keys()
            .take_while(|key| key.fire_at <= cursor.now)
            .find(|key| key.sequence < cursor.watermark)
            .copied()?;
        self.tasks
            .remove(&key)
            .map(|task| (task.category, task.action))
    }

    /// Fires every task due at `now` in order, returning the number fired.
    ///
    /// `fire` receives the scheduler so it can chain follow-up tasks; those are
    /// held back until the next tick.
    pub fn tick<F>(&mut self, now: I, mut fire: F) -> usize
    where
        F: FnMut(&mut Self, C, A),
    {
        let cursor = self.begin_tick(now);
        let mut fired = 0;
        while let Some((category, action)) = self.pop_due(&cursor) {
            fire(self, category, action);
            fired += 1;
        }
        fired
    }
}

impl<C, A, I> Default for TaskScheduler<C, A, I>
where
    C: Copy + Eq,
    I: Copy + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Lane {
        Alpha,
        Beta,
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn fires_in_fire_time_order_regardless_of_insertion() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        scheduler.schedule(at(30), Lane::Alpha, 3);
        scheduler.schedule(at(10), Lane::Alpha, 1);
        scheduler.schedule(at(20), Lane::Beta, 2);

        let mut fired = Vec::new();
        scheduler.tick(at(30), |_, _, action| fired.push(action));
        assert_eq!(fired, [1, 2, 3]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn ties_fire_in_insertion_order() {
        let mut scheduler = TaskScheduler::<Lane, char>::new();
        for action in ['a', 'b', 'c'] {
            scheduler.schedule(at(5), Lane::Alpha, action);
        }

        let mut fired = Vec::new();
        scheduler.tick(at(5), |_, _, action| fired.push(action));
        assert_eq!(fired, ['a', 'b', 'c']);
    }

    #[test]
    fn tasks_not_yet_due_stay_queued() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        scheduler.schedule(at(10), Lane::Alpha, 1);
        scheduler.schedule(at(50), Lane::Alpha, 2);

        assert_eq!(scheduler.tick(at(20), |_, _, _| {}), 1);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_fire_at(), Some(at(50)));
    }

    #[test]
    fn chained_tasks_wait_for_the_next_tick() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        scheduler.schedule(at(0), Lane::Alpha, 0);

        let mut fired = Vec::new();
        scheduler.tick(at(10), |queue, category, action| {
            fired.push(action);
            if action < 3 {
                queue.schedule(at(0), category, action + 1);
            }
        });
        assert_eq!(fired, [0]);

        scheduler.tick(at(10), |_, _, action| fired.push(action));
        assert_eq!(fired, [0, 1]);
    }

    #[test]
    fn cancel_category_drops_only_matching_tasks() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        scheduler.schedule(at(10), Lane::Alpha, 1);
        scheduler.schedule(at(20), Lane::Beta, 2);
        scheduler.schedule(at(30), Lane::Alpha, 3);

        assert_eq!(scheduler.cancel_category(Lane::Alpha), 2);
        assert_eq!(scheduler.pending_in(Lane::Alpha), 0);
        assert_eq!(scheduler.pending_in(Lane::Beta), 1);
    }

    #[test]
    fn cancellation_during_a_tick_suppresses_later_tasks() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        scheduler.schedule(at(1), Lane::Alpha, 1);
        scheduler.schedule(at(2), Lane::Beta, 2);
        scheduler.schedule(at(3), Lane::Beta, 3);

        let mut fired = Vec::new();
        scheduler.tick(at(5), |queue, _, action| {
            fired.push(action);
            if action == 1 {
                queue.cancel_category(Lane::Beta);
            }
        });
        assert_eq!(fired, [1]);
    }

    #[test]
    fn handle_cancels_a_single_task() {
        let mut scheduler = TaskScheduler::<Lane, u32>::new();
        let first = scheduler.schedule(at(10), Lane::Alpha, 1);
        scheduler.schedule(at(10), Lane::Alpha, 2);

        assert_eq!(scheduler.cancel(first), Some(1));
        assert_eq!(scheduler.cancel(first), None);
        assert_eq!(scheduler.pending_in(Lane::Alpha), 1);
    }
}
