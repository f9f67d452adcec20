//! Thread-local loop registration
//!
//! Enforces the one-loop-per-thread rule: each OS thread holds at most
//! one live `EventLoop`, registered at construction and cleared on Drop.

use std::cell::Cell;

thread_local! {
    /// Whether an EventLoop is live in this thread
    static LOOP_IN_THIS_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Claim this thread's loop slot. Returns false if already claimed,
/// in which case the caller must treat construction as fatal.
pub(crate) fn register_loop() -> bool {
    LOOP_IN_THIS_THREAD.with(|cell| {
        if cell.get() {
            false
        } else {
            cell.set(true);
            true
        }
    })
}

/// Release this thread's loop slot (EventLoop::drop).
pub(crate) fn unregister_loop() {
    LOOP_IN_THIS_THREAD.with(|cell| cell.set(false));
}

/// Whether the calling thread currently owns a live `EventLoop`.
#[inline]
pub fn has_loop_in_this_thread() -> bool {
    LOOP_IN_THIS_THREAD.with(|cell| cell.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        // Runs in its own test thread, so the slot starts free.
        assert!(!has_loop_in_this_thread());
        assert!(register_loop());
        assert!(has_loop_in_this_thread());
        assert!(!register_loop());
        unregister_loop();
        assert!(!has_loop_in_this_thread());
        assert!(register_loop());
        unregister_loop();
    }
}
