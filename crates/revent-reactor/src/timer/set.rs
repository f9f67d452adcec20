//! Ordered timer set.
//!
//! `BTreeMap<(Instant, TimerId), Timer>` keyed by expiration first and
//! insertion sequence second: deterministic total order even when many
//! timers share a timestamp, O(log n) insert/cancel, and batch
//! extraction of everything due via `split_off`. A side map from id to
//! expiration makes cancel-by-id O(log n) without scanning.
//!
//! The set is single-writer (loop thread) and carries no lock; it is
//! also usable standalone, which is how the unit tests drive it.

use super::entry::{Timer, TimerId};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

#[derive(Default)]
pub struct TimerSet {
    entries: BTreeMap<(Instant, TimerId), Timer>,
    /// id -> expiration, for cancel-by-id
    active: HashMap<TimerId, Instant>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            active: HashMap::new(),
        }
    }

    /// Insert a timer. Returns true when the new timer became the
    /// earliest deadline (the caller re-arms the timerfd then).
    pub(crate) fn insert(&mut self, timer: Timer) -> bool {
        let earliest_changed = match self.next_expiration() {
            Some(cur) => timer.expiration < cur,
            None => true,
        };
        self.active.insert(timer.id, timer.expiration);
        self.entries.insert((timer.expiration, timer.id), timer);
        earliest_changed
    }

    /// Cancel by id. True if the timer was pending and is now removed;
    /// false for unknown or already-fired ids.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.active.remove(&id) {
            Some(expiration) => {
                let removed = self.entries.remove(&(expiration, id));
                debug_assert!(removed.is_some());
                true
            }
            None => false,
        }
    }

    /// Extract every timer with expiration <= `now`, in firing order.
    pub(crate) fn expired(&mut self, now: Instant) -> Vec<Timer> {
        // Sentinel sorts after every (now, id) key, so due entries are
        // strictly below it.
        let later = self.entries.split_off(&(now, TimerId::MAX));
        let due = std::mem::replace(&mut self.entries, later);
        for (_, id) in due.keys() {
            self.active.remove(id);
        }
        due.into_values().collect()
    }

    /// Earliest pending deadline.
    pub fn next_expiration(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(when, _)| *when)
    }

    #[inline]
    pub fn contains(&self, id: TimerId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timer(when: Instant) -> Timer {
        Timer::new(TimerId::next(), when, None, Box::new(|_| {}))
    }

    #[test]
    fn test_insert_reports_earliest_change() {
        let mut set = TimerSet::new();
        let base = Instant::now();
        assert!(set.insert(timer(base + Duration::from_millis(100))));
        // Later deadline does not move the front.
        assert!(!set.insert(timer(base + Duration::from_millis(200))));
        // Earlier one does.
        assert!(set.insert(timer(base + Duration::from_millis(50))));
        assert_eq!(set.next_expiration(), Some(base + Duration::from_millis(50)));
    }

    #[test]
    fn test_same_instant_fire_in_insertion_order() {
        let mut set = TimerSet::new();
        let when = Instant::now();
        let a = timer(when);
        let b = timer(when);
        let c = timer(when);
        let (ida, idb, idc) = (a.id, b.id, c.id);
        set.insert(b);
        set.insert(c);
        set.insert(a);

        let due = set.expired(when + Duration::from_millis(1));
        let order: Vec<TimerId> = due.iter().map(|t| t.id).collect();
        // Sequence number breaks the tie, ascending.
        assert_eq!(order, vec![ida, idb, idc]);
    }

    #[test]
    fn test_expired_extracts_only_due() {
        let mut set = TimerSet::new();
        let base = Instant::now();
        let t1 = timer(base);
        let t2 = timer(base + Duration::from_secs(10));
        let id1 = t1.id;
        let id2 = t2.id;
        set.insert(t1);
        set.insert(t2);

        let due = set.expired(base + Duration::from_millis(1));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id1);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(id1));
        assert!(set.contains(id2));
    }

    #[test]
    fn test_expiration_exactly_now_is_due() {
        let mut set = TimerSet::new();
        let now = Instant::now();
        let t = timer(now);
        let id = t.id;
        set.insert(t);
        let due = set.expired(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
    }

    #[test]
    fn test_cancel_pending_and_unknown() {
        let mut set = TimerSet::new();
        let t = timer(Instant::now() + Duration::from_secs(1));
        let id = t.id;
        set.insert(t);

        assert!(set.cancel(id));
        assert!(set.is_empty());
        // Second cancel and a never-issued id are both silent no-ops.
        assert!(!set.cancel(id));
        assert!(!set.cancel(TimerId::next()));
    }

    #[test]
    fn test_cancelled_timer_not_extracted() {
        let mut set = TimerSet::new();
        let now = Instant::now();
        let keep = timer(now);
        let drop_ = timer(now);
        let keep_id = keep.id;
        let drop_id = drop_.id;
        set.insert(keep);
        set.insert(drop_);
        set.cancel(drop_id);

        let due = set.expired(now + Duration::from_millis(1));
        let ids: Vec<TimerId> = due.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![keep_id]);
        assert!(!ids.contains(&drop_id));
    }
}
