//! TimerQueue - glues the ordered set to the loop's timer channel.
//!
//! Owns the timerfd and the set. The `EventLoop` drives expiry in three
//! phases so due callbacks can take `&mut EventLoop` while the queue's
//! bookkeeping stays consistent:
//!
//! 1. `begin_expiry(now)` drains the timerfd and moves every due timer
//!    out of the set;
//! 2. the loop fires each moved-out timer exactly once, calling
//!    `finish_one` after each to restart repeating timers (unless they
//!    were cancelled by a callback in this very batch);
//! 3. `end_expiry()` clears batch state and re-arms the timerfd for the
//!    next pending deadline.

use super::entry::{Timer, TimerId};
use super::set::TimerSet;
use super::timerfd::TimerFd;
use crate::channel::ChannelId;
use revent_core::error::ReactorResult;
use revent_core::rtrace;
use std::collections::HashSet;
use std::os::unix::io::RawFd;
use std::time::Instant;

pub(crate) struct TimerQueue {
    timerfd: TimerFd,
    /// The loop-registered channel for the timerfd
    channel: Option<ChannelId>,
    set: TimerSet,
    /// True while a batch of expired timers is being fired
    calling_expired: bool,
    /// Ids cancelled by callbacks during the current batch; their
    /// repeating timers must not be restarted
    cancelled_in_batch: HashSet<TimerId>,
}

impl TimerQueue {
    pub(crate) fn new() -> ReactorResult<Self> {
        Ok(Self {
            timerfd: TimerFd::create()?,
            channel: None,
            set: TimerSet::new(),
            calling_expired: false,
            cancelled_in_batch: HashSet::new(),
        })
    }

    #[inline]
    pub(crate) fn fd(&self) -> RawFd {
        self.timerfd.fd()
    }

    pub(crate) fn set_channel(&mut self, id: ChannelId) {
        self.channel = Some(id);
    }

    #[inline]
    pub(crate) fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Insert a timer; re-arms the timerfd when the new timer moved the
    /// earliest deadline forward. Loop thread only.
    pub(crate) fn add(&mut self, timer: Timer) {
        rtrace!(
            "TimerQueue::add: id={} repeating={}",
            timer.id.raw(),
            timer.is_repeating()
        );
        let when = timer.expiration;
        if self.set.insert(timer) {
            self.timerfd.arm(when);
        }
    }

    /// Cancel by id. Unknown or already-fired ids are silent no-ops; an
    /// id belonging to the batch currently firing is recorded so its
    /// repeating timer is not restarted.
    pub(crate) fn cancel(&mut self, id: TimerId) {
        if self.set.cancel(id) {
            rtrace!("TimerQueue::cancel: id={} removed", id.raw());
            self.rearm();
        } else if self.calling_expired {
            self.cancelled_in_batch.insert(id);
        }
    }

    /// Phase 1: drain the timerfd and move out every due timer.
    pub(crate) fn begin_expiry(&mut self, now: Instant) -> Vec<Timer> {
        self.timerfd.drain();
        self.calling_expired = true;
        self.cancelled_in_batch.clear();
        self.set.expired(now)
    }

    /// Phase 2 bookkeeping, once per fired timer: restart repeating
    /// timers that were not cancelled mid-batch.
    pub(crate) fn finish_one(&mut self, mut timer: Timer) {
        if timer.is_repeating() && !self.cancelled_in_batch.contains(&timer.id) {
            timer.restart();
            self.set.insert(timer);
        }
    }

    /// Phase 3: end the batch and re-arm for the next deadline.
    pub(crate) fn end_expiry(&mut self) {
        self.calling_expired = false;
        self.cancelled_in_batch.clear();
        self.rearm();
    }

    fn rearm(&self) {
        match self.set.next_expiration() {
            Some(next) => self.timerfd.arm(next),
            None => self.timerfd.disarm(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timer(when: Instant, interval: Option<Duration>) -> Timer {
        Timer::new(TimerId::next(), when, interval, Box::new(|_| {}))
    }

    #[test]
    fn test_add_and_batch_extraction() {
        let mut q = TimerQueue::new().unwrap();
        let now = Instant::now();
        q.add(timer(now, None));
        q.add(timer(now + Duration::from_secs(5), None));
        assert_eq!(q.len(), 2);

        let due = q.begin_expiry(now + Duration::from_millis(1));
        assert_eq!(due.len(), 1);
        for t in due {
            q.finish_one(t);
        }
        q.end_expiry();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_repeating_timer_reinserted() {
        let mut q = TimerQueue::new().unwrap();
        let now = Instant::now();
        q.add(timer(now, Some(Duration::from_millis(100))));

        let due = q.begin_expiry(now + Duration::from_millis(1));
        assert_eq!(due.len(), 1);
        let id = due[0].id;
        for t in due {
            q.finish_one(t);
        }
        q.end_expiry();

        // Back in the set, one interval later.
        assert_eq!(q.len(), 1);
        assert!(q.set.contains(id));
        assert_eq!(q.set.next_expiration(), Some(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_cancel_mid_batch_suppresses_restart() {
        let mut q = TimerQueue::new().unwrap();
        let now = Instant::now();
        q.add(timer(now, Some(Duration::from_millis(50))));

        let due = q.begin_expiry(now + Duration::from_millis(1));
        let id = due[0].id;
        // A callback in this batch cancels the timer currently firing.
        q.cancel(id);
        for t in due {
            q.finish_one(t);
        }
        q.end_expiry();
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_cancel_pending_rearms() {
        let mut q = TimerQueue::new().unwrap();
        let now = Instant::now();
        let t = timer(now + Duration::from_secs(1), None);
        let id = t.id;
        q.add(t);
        q.cancel(id);
        assert_eq!(q.len(), 0);
        // Unknown id outside a batch: silent no-op.
        q.cancel(TimerId::next());
    }
}
