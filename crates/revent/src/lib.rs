//! # revent - Reactor EVENT loop
//!
//! A thread-confined reactor for Linux: register file descriptors with
//! callbacks, schedule timers, and inject work from other threads, all
//! dispatched by one loop blocking in poll(2) or epoll(7).
//!
//! ## Features
//!
//! - **One loop per thread**: `EventLoop` is not `Send`; each loop's
//!   structures are single-writer with no locking on the hot path
//! - **Two poller backends**: epoll by default on Linux, poll(2)
//!   fallback, selectable at runtime (`REVENT_USE_POLL=1`)
//! - **Timers without timer threads**: a timerfd wakes the same poll
//!   call that watches the descriptors; one-shot and repeating, with
//!   drift-free repeat scheduling
//! - **Cross-thread injection**: a cloneable [`LoopHandle`] queues
//!   closures onto the loop thread through a mutex + eventfd wakeup
//!
//! ## Quick Start
//!
//! ```ignore
//! use revent::EventLoop;
//! use std::time::Duration;
//!
//! fn main() {
//!     let mut lp = EventLoop::new();
//!     let handle = lp.handle();
//!
//!     // A repeating tick on the loop thread
//!     lp.run_every(Duration::from_millis(500), |lp| {
//!         println!("tick at iteration {}", lp.iteration());
//!     });
//!
//!     // Another thread can stop the loop or queue work
//!     std::thread::spawn(move || {
//!         std::thread::sleep(Duration::from_secs(3));
//!         handle.queue_in_loop(|lp| {
//!             println!("goodbye from the loop thread");
//!             lp.quit();
//!         });
//!     });
//!
//!     lp.loop_run();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │     register_channel(), run_after(), queue_in_loop()        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  EventLoop (loop thread)          LoopHandle (any thread)   │
//! │   channels + timers + poller  ◀──  pending queue + eventfd  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │         poll(2) / epoll(7) + timerfd + eventfd              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// Re-export the reactor surface
pub use revent_reactor::{
    CallbackSet,
    Channel,
    ChannelId,
    EventLoop,
    EventSet,
    LoopConfig,
    LoopHandle,
    Poller,
    PollerKind,
    TimerId,
    has_loop_in_this_thread,
};

// Re-export error types
pub use revent_core::{ReactorError, ReactorResult};

// Re-export logging macros and controls
pub use revent_core::{rerror, rwarn, rinfo, rdebug, rtrace};
pub use revent_core::kprint::{LogLevel, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use revent_core::env::{env_get, env_get_bool};
