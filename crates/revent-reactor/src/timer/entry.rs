//! Timer entry and id types.

use crate::event_loop::EventLoop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Opaque handle for cancelling a scheduled timer.
///
/// Sequence numbers come from a process-wide counter, so an id is never
/// reused; cancelling an id that already fired (or was never issued) is
/// a silent no-op. The sequence also breaks ties between timers sharing
/// an expiration instant, giving the set a deterministic total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocate the next sequence number.
    #[inline]
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Largest possible id; used as a range sentinel when extracting
    /// due entries.
    pub(crate) const MAX: TimerId = TimerId(u64::MAX);

    /// Raw sequence value (for logs).
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Timer callbacks run on the loop thread and receive the loop, so they
/// can schedule, cancel, or register channels. `Send` because the
/// closure crosses threads when scheduled through a `LoopHandle`.
pub type TimerCallback = Box<dyn FnMut(&mut EventLoop) + Send>;

/// A scheduled callback owned by the timer set.
pub(crate) struct Timer {
    pub(crate) id: TimerId,
    pub(crate) expiration: Instant,
    /// None = one-shot
    pub(crate) interval: Option<Duration>,
    pub(crate) callback: TimerCallback,
}

impl Timer {
    pub(crate) fn new(
        id: TimerId,
        expiration: Instant,
        interval: Option<Duration>,
        callback: TimerCallback,
    ) -> Self {
        Self {
            id,
            expiration,
            interval,
            callback,
        }
    }

    #[inline]
    pub(crate) fn is_repeating(&self) -> bool {
        self.interval.is_some()
    }

    /// Advance a repeating timer by exactly one interval, computed from
    /// the previous scheduled expiration rather than the fire time, so
    /// periodic timers do not accumulate drift. After a stall longer
    /// than one interval the new expiration may still be in the past;
    /// the next timerfd tick picks it up, bounding catch-up cost to one
    /// firing per tick.
    pub(crate) fn restart(&mut self) {
        if let Some(interval) = self.interval {
            self.expiration += interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = TimerId::next();
        let b = TimerId::next();
        let c = TimerId::next();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_restart_advances_from_expiration() {
        let start = Instant::now();
        let mut t = Timer::new(
            TimerId::next(),
            start,
            Some(Duration::from_millis(100)),
            Box::new(|_| {}),
        );
        t.restart();
        t.restart();
        assert_eq!(t.expiration, start + Duration::from_millis(200));
    }

    #[test]
    fn test_one_shot_restart_is_noop() {
        let start = Instant::now();
        let mut t = Timer::new(TimerId::next(), start, None, Box::new(|_| {}));
        t.restart();
        assert_eq!(t.expiration, start);
        assert!(!t.is_repeating());
    }
}
