//! `WakeupFd` - eventfd used to force an early return from the poller.
//!
//! Any thread may call `notify()`; the loop thread reads and discards
//! the counter from its wakeup channel. Coalescing: multiple notifies
//! before the loop reads collapse into a single wakeup (eventfd counter
//! semantics), so the write side never blocks the caller.

use crate::sys::{close_fd, last_errno};
use revent_core::error::{ReactorError, ReactorResult};
use revent_core::{rtrace, rwarn};
use std::os::unix::io::RawFd;

pub(crate) struct WakeupFd {
    fd: RawFd,
}

impl WakeupFd {
    /// Create a new nonblocking eventfd. Failure here means the reactor
    /// cannot be woken from other threads; callers treat it as fatal.
    pub(crate) fn create() -> ReactorResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(ReactorError::EventFdCreate(last_errno()));
        }
        Ok(Self { fd })
    }

    #[inline]
    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    /// Write one unit. Called from any thread.
    pub(crate) fn notify(&self) {
        let one: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            // EAGAIN means the counter is saturated - a wakeup is
            // already pending, which is all we wanted.
            if errno != libc::EAGAIN {
                rwarn!("WakeupFd::notify: write failed, errno {}", errno);
            }
        } else if ret != std::mem::size_of::<u64>() as isize {
            rwarn!("WakeupFd::notify: wrote {} bytes instead of 8", ret);
        }
    }

    /// Read and discard the counter. Called from the loop thread's
    /// wakeup channel callback. Returns the coalesced wakeup count.
    pub(crate) fn drain(&self) -> u64 {
        let mut count: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut count as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            if errno != libc::EAGAIN {
                rwarn!("WakeupFd::drain: read failed, errno {}", errno);
            }
            return 0;
        }
        if ret != std::mem::size_of::<u64>() as isize {
            rwarn!("WakeupFd::drain: read {} bytes instead of 8", ret);
            return 0;
        }
        rtrace!("WakeupFd::drain: {} coalesced wakeups", count);
        count
    }
}

impl Drop for WakeupFd {
    fn drop(&mut self) {
        close_fd(self.fd);
        self.fd = -1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_then_drain() {
        let wk = WakeupFd::create().unwrap();
        wk.notify();
        wk.notify();
        wk.notify();
        assert_eq!(wk.drain(), 3);
        // Nothing pending now; nonblocking read reports zero.
        assert_eq!(wk.drain(), 0);
    }

    #[test]
    fn test_notify_from_other_thread() {
        let wk = std::sync::Arc::new(WakeupFd::create().unwrap());
        let wk2 = wk.clone();
        std::thread::spawn(move || wk2.notify()).join().unwrap();
        assert_eq!(wk.drain(), 1);
    }
}
