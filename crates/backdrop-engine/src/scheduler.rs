//! Single-threaded timer queue on a virtual clock
//!
//! Stands in for the host event loop's one-shot and repeating timers. Time
//! only moves when the owner pops due timers, so tests drive it exactly and
//! the binary drives it from the wall clock.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Smallest accepted repeat period
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Queue position: deadline first, then insertion order
type Slot = (Duration, u64);

#[derive(Debug)]
struct Timer<T> {
    slot: Slot,
    task: T,
    period: Option<Duration>,
}

/// Timer queue owning the tasks it will hand back when due
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    queue: BTreeMap<Slot, TimerId>,
    timers: HashMap<TimerId, Timer<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
            timers: HashMap::new(),
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live timers
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Run `task` once after `delay`
    pub fn schedule_once(&mut self, delay: Duration, task: T) -> TimerId {
        self.insert(self.now + delay, task, None)
    }

    /// Run `task` every `period`, first after one period
    pub fn schedule_repeating(&mut self, period: Duration, task: T) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.insert(self.now + period, task, Some(period))
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(timer) => {
                self.queue.remove(&timer.slot);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Deadline of the earliest timer
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Take the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Repeating timers are re-armed before being returned, so
    /// a handler may cancel its own timer.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, T)> {
        let (&slot, &id) = self.queue.iter().next()?;
        if slot.0 > until {
            return None;
        }
        self.queue.remove(&slot);
        self.now = self.now.max(slot.0);

        let period = self.timers.get(&id)?.period;
        match period {
            Some(period) => {
                let next = (slot.0 + period, self.bump_seq());
                let timer = self.timers.get_mut(&id)?;
                timer.slot = next;
                self.queue.insert(next, id);
                Some((id, timer.task.clone()))
            }
            None => self.timers.remove(&id).map(|timer| (id, timer.task)),
        }
    }

    /// Move the clock forward without running anything
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    /// Drop every timer
    pub fn cancel_all(&mut self) {
        self.queue.clear();
        self.timers.clear();
    }

    fn insert(&mut self, deadline: Duration, task: T, period: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let slot = (deadline, self.bump_seq());
        self.queue.insert(slot, id);
        self.timers.insert(id, Timer { slot, task, period });
        id
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(s: &mut Scheduler<&'static str>, until: Duration) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some((_, task)) = s.pop_due(until) {
            fired.push(task);
        }
        s.advance_to(until);
        fired
    }

    #[test]
    fn test_once_fires_once() {
        let mut s = Scheduler::new();
        s.schedule_once(ms(300), "swap");

        assert!(drain(&mut s, ms(299)).is_empty());
        assert_eq!(drain(&mut s, ms(300)), vec!["swap"]);
        assert!(drain(&mut s, ms(10_000)).is_empty());
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_repeating_fires_each_period() {
        let mut s = Scheduler::new();
        s.schedule_repeating(ms(180), "tick");

        assert_eq!(drain(&mut s, ms(900)).len(), 5);
        assert_eq!(s.now(), ms(900));
        assert_eq!(s.next_deadline(), Some(ms(1080)));
    }

    #[test]
    fn test_deadline_order_and_fifo_ties() {
        let mut s = Scheduler::new();
        s.schedule_once(ms(500), "late");
        s.schedule_once(ms(100), "first");
        s.schedule_once(ms(100), "second");

        assert_eq!(drain(&mut s, ms(1000)), vec!["first", "second", "late"]);
    }

    #[test]
    fn test_cancel_stops_future_ticks() {
        let mut s = Scheduler::new();
        let id = s.schedule_repeating(ms(100), "tick");
        assert_eq!(drain(&mut s, ms(250)).len(), 2);

        assert!(s.cancel(id));
        assert!(!s.is_scheduled(id));
        assert!(drain(&mut s, ms(1000)).is_empty());
        assert!(!s.cancel(id));
    }

    #[test]
    fn test_cancel_inside_handler() {
        let mut s = Scheduler::new();
        let id = s.schedule_repeating(ms(100), "tick");

        let (popped, _) = s.pop_due(ms(100)).unwrap();
        assert_eq!(popped, id);
        // Re-armed before the handler runs, so cancelling it sticks
        assert!(s.cancel(id));
        assert!(s.pop_due(ms(1000)).is_none());
    }

    #[test]
    fn test_clock_moves_to_each_deadline() {
        let mut s = Scheduler::new();
        s.schedule_once(ms(40), "a");
        s.schedule_once(ms(70), "b");

        s.pop_due(ms(1000)).unwrap();
        assert_eq!(s.now(), ms(40));
        // Scheduling from inside a handler is relative to the handler's time
        s.schedule_once(ms(10), "c");
        assert_eq!(drain(&mut s, ms(1000)), vec!["c", "b"]);
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let mut s = Scheduler::new();
        s.schedule_repeating(Duration::ZERO, "spin");
        assert_eq!(drain(&mut s, ms(3)).len(), 3);
    }

    #[test]
    fn test_cancel_all() {
        let mut s = Scheduler::new();
        s.schedule_once(ms(1), "a");
        s.schedule_repeating(ms(1), "b");
        s.cancel_all();
        assert_eq!(s.pending(), 0);
        assert_eq!(s.next_deadline(), None);
    }
}
