//! epoll(7) backend - edge of the kernel's ready list (used level-
//! triggered, matching the poll backend's semantics).
//!
//! Registration state lives on the channel (`PollerState`): a channel is
//! ADDed on first nonzero interest, MODified on changes, DELeted when
//! interest goes empty, and re-ADDed if interest returns. The `u64`
//! field of each epoll event carries the `ChannelId`, so readiness maps
//! back to a channel without a table scan.

use super::Poller;
use crate::channel::{ChannelArena, ChannelId, PollerState};
use crate::sys::{close_fd, last_errno};
use revent_core::error::{ReactorError, ReactorResult};
use revent_core::events::EventSet;
use revent_core::{rerror, rtrace};
use std::os::unix::io::RawFd;
use std::time::Instant;

pub struct EpollPoller {
    epfd: RawFd,
    events: Vec<libc::epoll_event>,
}

fn to_epoll_events(ev: EventSet) -> u32 {
    let mut out: u32 = 0;
    if ev.contains(EventSet::IN) {
        out |= libc::EPOLLIN as u32;
    }
    if ev.contains(EventSet::PRI) {
        out |= libc::EPOLLPRI as u32;
    }
    if ev.contains(EventSet::OUT) {
        out |= libc::EPOLLOUT as u32;
    }
    if ev.contains(EventSet::RDHUP) {
        out |= libc::EPOLLRDHUP as u32;
    }
    out
}

fn from_epoll_events(raw: u32) -> EventSet {
    let mut out = EventSet::NONE;
    if raw & libc::EPOLLIN as u32 != 0 {
        out.insert(EventSet::IN);
    }
    if raw & libc::EPOLLPRI as u32 != 0 {
        out.insert(EventSet::PRI);
    }
    if raw & libc::EPOLLOUT as u32 != 0 {
        out.insert(EventSet::OUT);
    }
    if raw & libc::EPOLLERR as u32 != 0 {
        out.insert(EventSet::ERR);
    }
    if raw & libc::EPOLLHUP as u32 != 0 {
        out.insert(EventSet::HUP);
    }
    if raw & libc::EPOLLRDHUP as u32 != 0 {
        out.insert(EventSet::RDHUP);
    }
    out
}

impl EpollPoller {
    /// Create the epoll instance. Failure is reported to the factory,
    /// which treats it as fatal.
    pub fn create(event_buffer: usize) -> ReactorResult<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(ReactorError::PollerCreate(last_errno()));
        }
        Ok(Self {
            epfd,
            events: vec![libc::epoll_event { events: 0, u64: 0 }; event_buffer.max(1)],
        })
    }

    /// epoll_ctl wrapper. ADD/MOD failure is fatal: the kernel's view of
    /// the registration would diverge from ours with no way back.
    fn ctl(&mut self, op: libc::c_int, fd: RawFd, id: ChannelId, interest: EventSet) {
        let mut ev = libc::epoll_event {
            events: to_epoll_events(interest),
            u64: id.raw() as u64,
        };
        let ret = unsafe { libc::epoll_ctl(self.epfd, op, fd, &mut ev) };
        if ret < 0 {
            let errno = last_errno();
            if op == libc::EPOLL_CTL_DEL {
                rerror!("EpollPoller: EPOLL_CTL_DEL fd={} errno {}", fd, errno);
            } else {
                rerror!("EpollPoller: epoll_ctl op={} fd={} errno {}", op, fd, errno);
                panic!(
                    "EpollPoller: epoll_ctl failed: {}",
                    ReactorError::PollerControl(errno)
                );
            }
        }
    }
}

impl Poller for EpollPoller {
    fn poll(
        &mut self,
        timeout_ms: i32,
        arena: &mut ChannelArena,
        active: &mut Vec<ChannelId>,
    ) -> Instant {
        let n = unsafe {
            libc::epoll_wait(
                self.epfd,
                self.events.as_mut_ptr(),
                self.events.len() as libc::c_int,
                timeout_ms,
            )
        };
        let now = Instant::now();

        if n < 0 {
            let errno = last_errno();
            if errno == libc::EINTR {
                rtrace!("EpollPoller::poll: interrupted");
            } else {
                rerror!("EpollPoller::poll: errno {}", errno);
            }
            return now;
        }
        if n == 0 {
            rtrace!("EpollPoller::poll: nothing happened");
            return now;
        }

        for i in 0..n as usize {
            let ev = &self.events[i];
            let id = ChannelId(ev.u64 as u32);
            if let Some(ch) = arena.get_mut(id) {
                ch.set_revents(from_epoll_events(ev.events));
                active.push(id);
            }
        }

        // Ready list filled the buffer: grow so a burst is picked up in
        // one wait next time.
        if n as usize == self.events.len() {
            self.events
                .resize(self.events.len() * 2, libc::epoll_event { events: 0, u64: 0 });
        }
        now
    }

    fn update_channel(&mut self, id: ChannelId, arena: &mut ChannelArena) {
        let Some(ch) = arena.get_mut(id) else {
            rerror!("EpollPoller::update_channel: unknown channel {:?}", id);
            return;
        };
        let fd = ch.fd();
        let interest = ch.interest();
        let state = ch.poller_state();

        match state {
            PollerState::New | PollerState::Detached => {
                if !interest.is_empty() {
                    ch.set_poller_state(PollerState::Added);
                    self.ctl(libc::EPOLL_CTL_ADD, fd, id, interest);
                }
            }
            PollerState::Added => {
                if interest.is_empty() {
                    ch.set_poller_state(PollerState::Detached);
                    self.ctl(libc::EPOLL_CTL_DEL, fd, id, interest);
                } else {
                    self.ctl(libc::EPOLL_CTL_MOD, fd, id, interest);
                }
            }
        }
    }

    fn remove_channel(&mut self, id: ChannelId, arena: &mut ChannelArena) {
        let Some(ch) = arena.get_mut(id) else {
            return;
        };
        let fd = ch.fd();
        if ch.poller_state() == PollerState::Added {
            self.ctl(libc::EPOLL_CTL_DEL, fd, id, EventSet::NONE);
        }
        ch.set_poller_state(PollerState::New);
    }

    fn name(&self) -> &'static str {
        "epoll"
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        close_fd(self.epfd);
        self.epfd = -1;
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
    fn test_add_modify_detach_cycle() {
        let (rd, wr) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = EpollPoller::create(4).unwrap();

        let id = arena.insert(Channel::new(rd, CallbackSet::new()));
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);
        assert_eq!(arena.get(id).unwrap().poller_state(), PollerState::Added);

        let byte = [9u8];
        unsafe { libc::write(wr, byte.as_ptr() as *const libc::c_void, 1) };

        let mut active = Vec::new();
        poller.poll(100, &mut arena, &mut active);
        assert_eq!(active, vec![id]);
        assert!(arena.get(id).unwrap().revents().contains(EventSet::IN));

        // Interest cleared: detached from the kernel, no readiness.
        arena.get_mut(id).unwrap().set_interest(EventSet::NONE);
        poller.update_channel(id, &mut arena);
        assert_eq!(arena.get(id).unwrap().poller_state(), PollerState::Detached);

        active.clear();
        poller.poll(0, &mut arena, &mut active);
        assert!(active.is_empty());

        // Re-enabled: re-added, pending byte visible again.
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);
        poller.poll(0, &mut arena, &mut active);
        assert_eq!(active, vec![id]);

        poller.remove_channel(id, &mut arena);
        close(rd);
        close(wr);
    }

    #[test]
    fn test_update_is_idempotent() {
        let (rd, wr) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = EpollPoller::create(4).unwrap();

        let id = arena.insert(Channel::new(rd, CallbackSet::new()));
        arena.get_mut(id).unwrap().set_interest(EventSet::IN);
        poller.update_channel(id, &mut arena);
        // Second update with the same interest goes through MOD, not a
        // double ADD (which the kernel would reject with EEXIST).
        poller.update_channel(id, &mut arena);
        assert_eq!(arena.get(id).unwrap().poller_state(), PollerState::Added);

        poller.remove_channel(id, &mut arena);
        close(rd);
        close(wr);
    }

    #[test]
    fn test_writable_reported() {
        let (rd, wr) = pipe();
        let mut arena = ChannelArena::new();
        let mut poller = EpollPoller::create(4).unwrap();

        let id = arena.insert(Channel::new(wr, CallbackSet::new()));
        arena.get_mut(id).unwrap().set_interest(EventSet::OUT);
        poller.update_channel(id, &mut arena);

        let mut active = Vec::new();
        poller.poll(100, &mut arena, &mut active);
        assert_eq!(active, vec![id]);
        assert!(arena.get(id).unwrap().revents().contains(EventSet::OUT));

        poller.remove_channel(id, &mut arena);
        close(rd);
        close(wr);
    }

    #[test]
    fn test_event_translation() {
        let ev = EventSet::IN | EventSet::OUT | EventSet::PRI;
        assert_eq!(from_epoll_events(to_epoll_events(ev)), ev);
    }
}
