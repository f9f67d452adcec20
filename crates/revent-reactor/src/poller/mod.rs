//! Poller - I/O multiplexing backends.
//!
//! Trait abstraction over the OS wait facility, with two leaf
//! implementations selected at construction time:
//!
//! - `PollPoller` - level-triggered table scan over poll(2)
//! - `EpollPoller` - epoll(7) ready-list (Linux)
//!
//! Each backend is a leaf: no shared mutable base state, and all calls
//! happen on the owning loop's thread. Callers get no ordering promise
//! for ready channels within one wait.

mod epoll;
mod poll;

pub use epoll::EpollPoller;
pub use poll::PollPoller;

use crate::channel::{ChannelArena, ChannelId};
use revent_core::env::env_get_bool;
use revent_core::rinfo;
use std::time::Instant;

/// An I/O multiplexing backend.
///
/// All methods are called from the owning loop's thread only; the
/// `EventLoop` enforces that before delegating here.
pub trait Poller {
    /// Block up to `timeout_ms` milliseconds (negative = indefinitely)
    /// for readiness. Fills `revents` on ready channels in `arena`,
    /// pushes their ids into `active` in backend order, and returns the
    /// wall-clock time of return. EINTR yields an empty ready set.
    fn poll(
        &mut self,
        timeout_ms: i32,
        arena: &mut ChannelArena,
        active: &mut Vec<ChannelId>,
    ) -> Instant;

    /// Add or modify a channel's registration to match its current
    /// interest mask. Idempotent with respect to backend state.
    fn update_channel(&mut self, id: ChannelId, arena: &mut ChannelArena);

    /// Drop a channel's registration. The loop has already verified the
    /// channel's interest is empty.
    fn remove_channel(&mut self, id: ChannelId, arena: &mut ChannelArena);

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerKind {
    /// Platform default (epoll on Linux), honoring `REVENT_USE_POLL=1`
    Auto,
    /// poll(2) table scan
    Poll,
    /// epoll(7) ready list
    Epoll,
}

/// Construct a poller backend.
///
/// Backend construction failure is fatal: a reactor without a working
/// wait facility has no recovery path.
pub fn create_poller(kind: PollerKind, event_buffer: usize) -> Box<dyn Poller> {
    let kind = match kind {
        PollerKind::Auto => {
            if env_get_bool("REVENT_USE_POLL", false) {
                PollerKind::Poll
            } else {
                default_kind()
            }
        }
        k => k,
    };

    let poller: Box<dyn Poller> = match kind {
        PollerKind::Epoll => Box::new(EpollPoller::create(event_buffer).unwrap_or_else(|e| {
            revent_core::rerror!("create_poller: {}", e);
            panic!("create_poller: epoll backend creation failed: {}", e);
        })),
        _ => Box::new(PollPoller::new()),
    };
    rinfo!("create_poller: using {} backend", poller.name());
    poller
}

fn default_kind() -> PollerKind {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            PollerKind::Epoll
        } else {
            PollerKind::Poll
        }
    }
}
