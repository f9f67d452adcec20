//! # revent-reactor
//!
//! A reactor-style event loop for Linux: one loop per thread, blocking
//! on poll(2) or epoll(7), dispatching per-descriptor callbacks, with a
//! timerfd-backed timer queue and an eventfd wakeup path for injecting
//! work from other threads.
//!
//! ## Architecture
//!
//! ```text
//!            other threads                        loop thread
//!   ┌──────────────────────────┐      ┌──────────────────────────────┐
//!   │ LoopHandle               │      │ EventLoop                    │
//!   │  queue_in_loop / run_at  │      │   ┌────────┐  ┌───────────┐  │
//!   │  quit / cancel           │─────▶│   │ Poller │  │ TimerQueue│  │
//!   └──────────────────────────┘      │   └────┬───┘  └─────┬─────┘  │
//!        │ mutex push + eventfd       │        ▼            ▼        │
//!        └────────────────────────────│──▶ poll → dispatch channels  │
//!                                     │        → drain pending queue │
//!                                     └──────────────────────────────┘
//! ```
//!
//! The loop thread is the single writer for every structure except the
//! pending-task queue, which is the one mutex-protected handoff point.
//! Structural mutation from a foreign thread is a compile error:
//! `EventLoop` is not `Send`, and the cloneable [`LoopHandle`] only
//! exposes the queue-and-wake surface.
//!
//! ## Quick start
//!
//! ```ignore
//! use revent_reactor::EventLoop;
//! use std::time::Duration;
//!
//! let mut lp = EventLoop::new();
//! let handle = lp.handle();
//!
//! lp.run_after(Duration::from_millis(50), move |lp| {
//!     println!("timer fired on iteration {}", lp.iteration());
//!     lp.quit();
//! });
//!
//! // handle can be moved to other threads for run_at / queue_in_loop / quit
//! lp.loop_run();
//! ```

pub mod channel;
pub mod config;
pub mod event_loop;
pub mod poller;
pub mod timer;

mod sys;
mod tls;
mod wakeup;

pub use channel::{CallbackSet, Channel, ChannelArena, ChannelId};
pub use config::LoopConfig;
pub use event_loop::{EventLoop, LoopHandle};
pub use poller::{create_poller, Poller, PollerKind};
pub use timer::TimerId;
pub use tls::has_loop_in_this_thread;

pub use revent_core::{EventSet, LogLevel, ReactorError, ReactorResult};
