//! poll(2) backend - level-triggered table scan.
//!
//! Keeps a cached `pollfd` table in registration order plus an
//! fd -> (table slot, channel id) map. A channel whose interest goes
//! empty keeps its table slot with the fd negated, which makes poll(2)
//! skip the entry without churning the table; removal swaps the tail
//! entry into the vacated slot and patches the map.

use super::Poller;
use crate::channel::{ChannelArena, ChannelId, PollerState};
use crate::sys::last_errno;
use revent_core::events::EventSet;
use revent_core::{rerror, rtrace};
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::time::Instant;

pub struct PollPoller {
    pollfds: Vec<libc::pollfd>,
    /// fd -> (pollfds slot, channel id)
    lookup: HashMap<RawFd, (usize, ChannelId)>,
}

/// Park an entry: negative fds are ignored by poll(2). `-fd - 1` keeps
/// fd 0 representable.
#[inline]
fn parked(fd: RawFd) -> libc::c_int {
    -fd - 1
}

#[inline]
fn unparked(raw: libc::c_int) -> RawFd {
    if raw < 0 {
        -raw - 1
    } else {
        raw
    }
}

fn to_poll_events(ev: EventSet) -> libc::c_short {
    let mut out: libc::c_short = 0;
    if ev.contains(EventSet::IN) {
        out |= libc::POLLIN;
    }
    if ev.contains(EventSet::PRI) {
        out |= libc::POLLPRI;
    }
    if ev.contains(EventSet::OUT) {
        out |= libc::POLLOUT;
    }
    if ev.contains(EventSet::RDHUP) {
        out |= libc::POLLRDHUP;
    }
    out
}

fn from_poll_events(raw: libc::c_short) -> EventSet {
    let mut out = EventSet::NONE;
    if raw & libc::POLLIN != 0 {
        out.insert(EventSet::IN);
    }
    if raw & libc::POLLPRI != 0 {
        out.insert(EventSet::PRI);
    }
    if raw & libc::POLLOUT != 0 {
        out.insert(EventSet::OUT);
    }
    if raw & libc::POLLERR != 0 {
        out.insert(EventSet::ERR);
    }
    if raw & libc::POLLHUP != 0 {
        out.insert(EventSet::HUP);
    }
    if raw & libc::POLLNVAL != 0 {
        out.insert(EventSet::NVAL);
    }
    if raw & libc::POLLRDHUP != 0 {
        out.insert(EventSet::RDHUP);
    }
    out
}

impl PollPoller {
    pub fn new() -> Self {
        Self {
            pollfds: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl Default for PollPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller for PollPoller {
    fn poll(
        &mut self,
        timeout_ms: i32,
        arena: &mut ChannelArena,
        active: &mut Vec<ChannelId>,
    ) -> Instant {
        let ret = unsafe {
            libc::poll(
                self.pollfds.as_mut_ptr(),
                self.pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        let now = Instant::now();

        if ret < 0 {
            let errno = last_errno();
            if errno == libc::EINTR {
                rtrace!("PollPoller::poll: interrupted");
            } else {
                rerror!("PollPoller::poll: errno {}", errno);
            }
            return now;
        }
        if ret == 0 {
            rtrace!("PollPoller::poll: nothing happened");
            return now;
        }

        let mut remaining = ret as usize;
        for pfd in &self.pollfds {
            if remaining == 0 {
                break;
            }
            if pfd.revents == 0 {
                continue;
            }
            remaining -= 1;
            if let Some(&(_, id)) = self.lookup.get(&pfd.fd) {
                if let Some(ch) = arena.get_mut(id) {
                    ch.set_revents(from_poll_events(pfd.revents));
                    active.push(id);
                }
            }
        }
        now
    }

    fn update_channel(&mut self, id: ChannelId, arena: &mut ChannelArena) {
        let Some(ch) = arena.get_mut(id) else {
            rerror!("PollPoller::update_channel: unknown channel {:?}", id);
            return;
        };
        let fd = ch.fd();
        let interest = ch.interest();
        let events = to_poll_events(interest);
        ch.set_poller_state(PollerState::Added);

        if let Some(&(slot, _)) = self.lookup.get(&fd) {
            let pfd = &mut self.pollfds[slot];
            pfd.events = events;
            pfd.revents = 0;
            pfd.fd = if interest.is_empty() { parked(fd) } else { fd };
        } else {
            self.pollfds.push(libc::pollfd {
                fd: if interest.is_empty() { parked(fd) } else { fd },
                events,
                revents: 0,
            });
            self.lookup.insert(fd, (self.pollfds.len() - 1, id));
        }
    }

    fn remove_channel(&mut self, id: ChannelId, arena: &mut ChannelArena) {
        let Some(ch) = arena.get_mut(id) else {
            return;
        };
        let fd = ch.fd();
        ch.set_poller_state(PollerState::New);

        let Some((slot, _)) = self.lookup.remove(&fd) else {
            return;
        };
        self.pollfds.swap_remove(slot);
        if slot < self.pollfds.len() {
            // Patch the entry that got swapped into the vacated slot.
            let moved_fd = unparked(self.pollfds[slot].fd);
            if let Some(entry) = self.lookup.get_mut(&moved_fd) {
                entry.0 = slot;
            }
        }
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CallbackSet, Channel};

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0 as libc::c_int; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(ret, 0);
        (fds[0], fds[1])
    }

    fn close(fd: RawFd) {
        unsafe {
            libc::close(fd);
        }
    }

    #[test]
    fn test_pipe_readable_after_write() {
        let (rd, wr) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = PollPoller::new();

        let id = arena.insert(Channel::new(rd, CallbackSet::new()));
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);

        let mut active = Vec::new();
        poller.poll(0, &mut arena, &mut active);
        assert!(active.is_empty());

        let byte = [0x2au8];
        unsafe { libc::write(wr, byte.as_ptr() as *const libc::c_void, 1) };

        active.clear();
        poller.poll(100, &mut arena, &mut active);
        assert_eq!(active, vec![id]);
        assert!(arena.get(id).unwrap().revents().contains(EventSet::IN));

        close(rd);
        close(wr);
    }

    #[test]
    fn test_parked_channel_reports_nothing() {
        let (rd, wr) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = PollPoller::new();

        let id = arena.insert(Channel::new(rd, CallbackSet::new()));
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);

        let byte = [1u8];
        unsafe { libc::write(wr, byte.as_ptr() as *const libc::c_void, 1) };

        // Interest cleared: entry stays in the table but parked.
        arena.get_mut(id).unwrap().set_interest(EventSet::NONE);
        poller.update_channel(id, &mut arena);

        let mut active = Vec::new();
        poller.poll(0, &mut arena, &mut active);
        assert!(active.is_empty());

        // Re-enable and the pending byte shows up again.
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);
        poller.poll(0, &mut arena, &mut active);
        assert_eq!(active, vec![id]);

        close(rd);
        close(wr);
    }

    #[test]
    fn test_remove_patches_swapped_slot() {
        let (rd1, wr1) = pipe();
        let (rd2, wr2) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = PollPoller::new();

        let a = arena.insert(Channel::new(rd1, CallbackSet::new()));
        arena.get_mut(a).unwrap().set_interest(EventSet::IN);
        poller.update_channel(a, &mut arena);

        let b = arena.insert(Channel::new(rd2, CallbackSet::new()));
        arena.get_mut(b).unwrap().set_interest(EventSet::IN);
        poller.update_channel(b, &mut arena);

        // Removing the first entry swaps the second into slot 0.
        arena.get_mut(a).unwrap().set_interest(EventSet::NONE);
        poller.remove_channel(a, &mut arena);

        let byte = [7u8];
        unsafe { libc::write(wr2, byte.as_ptr() as *const libc::c_void, 1) };

        let mut active = Vec::new();
        poller.poll(100, &mut arena, &mut active);
        assert_eq!(active, vec![b]);

        close(rd1);
        close(wr1);
        close(rd2);
        close(wr2);
    }

    #[test]
    fn test_event_translation() {
        let ev = EventSet::IN | EventSet::OUT | EventSet::RDHUP;
        let raw = to_poll_events(ev);
        assert_eq!(from_poll_events(raw), ev);
        // Ready-only bits come back even though they cannot be requested.
        assert!(from_poll_events(libc::POLLHUP | libc::POLLERR)
            .contains(EventSet::HUP | EventSet::ERR));
    }
}
