//! EventLoop configuration
//!
//! Compile-time defaults with runtime environment overrides, applied in
//! that order (environment wins), then builder methods on top.
//!
//! # Environment Variables
//!
//! - `REVENT_POLL_TIMEOUT_MS` - Blocking wait bound per iteration
//! - `REVENT_EVENT_BUFFER` - Initial epoll ready-list capacity
//! - `REVENT_USE_POLL` - Force the poll(2) backend (0/1)
//! - `REVENT_IGNORE_SIGPIPE` - Ignore SIGPIPE at first loop creation (0/1)

use crate::poller::PollerKind;
use revent_core::env::{env_get, env_get_bool};
use std::time::Duration;

/// Default wait bound. Timers are driven by timerfd, so this only caps
/// how long a completely idle iteration blocks.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 10_000;

/// Default initial epoll ready-list capacity (grows on demand).
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// EventLoop configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Upper bound on one blocking wait
    pub poll_timeout: Duration,
    /// Poller backend selection
    pub poller: PollerKind,
    /// Initial epoll ready-list capacity
    pub event_buffer: usize,
    /// Ignore SIGPIPE process-wide at first loop creation
    pub ignore_sigpipe: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LoopConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self {
            poll_timeout: Duration::from_millis(env_get(
                "REVENT_POLL_TIMEOUT_MS",
                DEFAULT_POLL_TIMEOUT_MS,
            )),
            poller: PollerKind::Auto,
            event_buffer: env_get("REVENT_EVENT_BUFFER", DEFAULT_EVENT_BUFFER),
            ignore_sigpipe: env_get_bool("REVENT_IGNORE_SIGPIPE", true),
        }
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn poller(mut self, kind: PollerKind) -> Self {
        self.poller = kind;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn ignore_sigpipe(mut self, on: bool) -> Self {
        self.ignore_sigpipe = on;
        self
    }

    /// Wait bound as the c_int milliseconds poll/epoll expect.
    pub(crate) fn poll_timeout_ms(&self) -> i32 {
        self.poll_timeout.as_millis().min(i32::MAX as u128) as i32
    }
}
