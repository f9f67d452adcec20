//! Channel - the per-descriptor event-interest/dispatch unit.
//!
//! A `Channel` pairs one file descriptor with an interest mask and up to
//! four callbacks (read, write, close, error). Channels live in the
//! loop-owned [`ChannelArena`]; user code holds an opaque [`ChannelId`]
//! and mutates the channel through `EventLoop` methods, which keeps
//! every structural mutation on the owning thread. The descriptor itself
//! is NOT owned: whoever created the fd must call
//! `EventLoop::remove_channel` before closing it.
//!
//! # Dispatch order
//!
//! `EventLoop` dispatches the ready mask in a fixed priority order:
//! close (hang-up without readable data), then read, then write, then
//! error. Preferring read over close on a half-open socket lets the
//! read callback consume whatever the peer wrote before shutting down.

use crate::event_loop::EventLoop;
use revent_core::events::EventSet;
use std::os::unix::io::RawFd;
use std::time::Instant;

/// Opaque identifier for a registered channel (arena slot index).
///
/// Valid from `register_channel` until `remove_channel`; using a stale
/// id after removal is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub(crate) u32);

impl ChannelId {
    /// Raw slot value, for logs.
    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Read callback: receives the loop and the poll-return time.
pub type ReadCallback = Box<dyn FnMut(&mut EventLoop, Instant)>;

/// Write/close/error callback: receives the loop.
pub type EventCallback = Box<dyn FnMut(&mut EventLoop)>;

/// The callbacks a channel dispatches. Build with the `with_*` methods;
/// unset slots are simply skipped at dispatch time.
#[derive(Default)]
pub struct CallbackSet {
    pub(crate) read: Option<ReadCallback>,
    pub(crate) write: Option<EventCallback>,
    pub(crate) close: Option<EventCallback>,
    pub(crate) error: Option<EventCallback>,
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read(mut self, f: impl FnMut(&mut EventLoop, Instant) + 'static) -> Self {
        self.read = Some(Box::new(f));
        self
    }

    pub fn with_write(mut self, f: impl FnMut(&mut EventLoop) + 'static) -> Self {
        self.write = Some(Box::new(f));
        self
    }

    pub fn with_close(mut self, f: impl FnMut(&mut EventLoop) + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&mut EventLoop) + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

/// Registration state with the epoll backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollerState {
    /// Never registered with the backend
    New,
    /// Currently registered
    Added,
    /// Was registered, then detached (interest went empty)
    Detached,
}

/// One registered descriptor.
pub struct Channel {
    fd: RawFd,
    interest: EventSet,
    revents: EventSet,
    poller_state: PollerState,
    /// True while callbacks are taken out for dispatch. Guards against
    /// restoring callbacks into a slot that was freed and reused by a
    /// callback in the same dispatch.
    dispatching: bool,
    callbacks: CallbackSet,
}

impl Channel {
    pub(crate) fn new(fd: RawFd, callbacks: CallbackSet) -> Self {
        Self {
            fd,
            interest: EventSet::NONE,
            revents: EventSet::NONE,
            poller_state: PollerState::New,
            dispatching: false,
            callbacks,
        }
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    #[inline]
    pub fn interest(&self) -> EventSet {
        self.interest
    }

    #[inline]
    pub fn revents(&self) -> EventSet {
        self.revents
    }

    #[inline]
    pub(crate) fn set_interest(&mut self, interest: EventSet) {
        self.interest = interest;
    }

    #[inline]
    pub(crate) fn set_revents(&mut self, revents: EventSet) {
        self.revents = revents;
    }

    #[inline]
    pub(crate) fn poller_state(&self) -> PollerState {
        self.poller_state
    }

    #[inline]
    pub(crate) fn set_poller_state(&mut self, state: PollerState) {
        self.poller_state = state;
    }
}

/// Arena of channels owned by one `EventLoop`.
///
/// Slab with a LIFO free stack: freed slots are reused most-recent-first
/// so the hot set stays compact. Lookup is a plain index; the dispatch
/// path does not allocate.
pub struct ChannelArena {
    slots: Vec<Option<Channel>>,
    free: Vec<u32>,
}

impl ChannelArena {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, channel: Channel) -> ChannelId {
        if let Some(slot) = self.free.pop() {
            debug_assert!(self.slots[slot as usize].is_none());
            self.slots[slot as usize] = Some(channel);
            ChannelId(slot)
        } else {
            self.slots.push(Some(channel));
            ChannelId((self.slots.len() - 1) as u32)
        }
    }

    pub(crate) fn remove(&mut self, id: ChannelId) -> Option<Channel> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        let channel = slot.take();
        if channel.is_some() {
            self.free.push(id.0);
        }
        channel
    }

    #[inline]
    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut())
    }

    #[inline]
    pub(crate) fn contains(&self, id: ChannelId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live channels.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the callbacks out for dispatch, marking the slot as
    /// dispatching. Returns None for a vacated slot.
    pub(crate) fn take_callbacks(&mut self, id: ChannelId) -> Option<CallbackSet> {
        let ch = self.get_mut(id)?;
        ch.dispatching = true;
        Some(std::mem::take(&mut ch.callbacks))
    }

    /// Put callbacks back after dispatch. A no-op when the channel was
    /// removed mid-dispatch, or when its slot was reused by a fresh
    /// registration (fresh channels are not marked dispatching).
    pub(crate) fn restore_callbacks(&mut self, id: ChannelId, callbacks: CallbackSet) {
        if let Some(ch) = self.get_mut(id) {
            if ch.dispatching {
                ch.dispatching = false;
                ch.callbacks = callbacks;
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(fd: RawFd) -> Channel {
        Channel::new(fd, CallbackSet::new())
    }

    #[test]
    fn test_insert_get_remove() {
        let mut arena = ChannelArena::new();
        let a = arena.insert(channel(3));
        let b = arena.insert(channel(4));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).unwrap().fd(), 3);
        assert_eq!(arena.get(b).unwrap().fd(), 4);

        let removed = arena.remove(a).unwrap();
        assert_eq!(removed.fd(), 3);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_lifo_slot_reuse() {
        let mut arena = ChannelArena::new();
        let a = arena.insert(channel(3));
        let _b = arena.insert(channel(4));
        arena.remove(a);
        let c = arena.insert(channel(5));
        // Most recently freed slot comes back first.
        assert_eq!(c, a);
        assert_eq!(arena.get(c).unwrap().fd(), 5);
    }

    #[test]
    fn test_double_remove_is_none() {
        let mut arena = ChannelArena::new();
        let a = arena.insert(channel(3));
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_restore_skips_reused_slot() {
        let mut arena = ChannelArena::new();
        let a = arena.insert(channel(3));
        let taken = arena.take_callbacks(a).unwrap();

        // Channel removed and slot reused while its callbacks were out.
        arena.remove(a);
        let reused = arena.insert(channel(7));
        assert_eq!(reused, a);

        arena.restore_callbacks(a, taken);
        // The fresh channel keeps its own (empty but not restored-over) state.
        assert!(!arena.get(reused).unwrap().dispatching);
    }

    #[test]
    fn test_interest_and_revents() {
        let mut ch = channel(9);
        assert!(ch.interest().is_empty());
        ch.set_interest(EventSet::IN | EventSet::OUT);
        assert!(ch.interest().contains(EventSet::IN));
        ch.set_revents(EventSet::OUT);
        assert_eq!(ch.revents(), EventSet::OUT);
    }
}
