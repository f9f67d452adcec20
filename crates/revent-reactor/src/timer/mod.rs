//! Timer subsystem.
//!
//! Timers are an ordered set keyed by (expiration, sequence), exposed
//! to the loop through a dedicated timerfd: the kernel makes the fd
//! readable at the earliest deadline, the loop's timer channel drains
//! it and fires every due callback in one batch.
//!
//! ```text
//!   LoopHandle::run_at ──queue──▶ EventLoop ──▶ TimerQueue
//!                                                  │ insert / cancel
//!                                                  ▼
//!                                              TimerSet (BTreeMap)
//!                                                  │ earliest deadline
//!                                                  ▼
//!                                              TimerFd (timerfd_settime)
//! ```
//!
//! Scheduling from any thread goes through the loop's pending queue, so
//! the set itself is single-writer and needs no lock.

mod entry;
mod queue;
mod set;
mod timerfd;

pub use entry::TimerId;
pub(crate) use entry::{Timer, TimerCallback};
pub(crate) use queue::TimerQueue;
pub(crate) use set::TimerSet;
pub(crate) use timerfd::TimerFd;
