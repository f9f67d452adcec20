//! `TimerFd` - timerfd_create(2) wrapper.
//!
//! The kernel delivers readability on the fd at the armed deadline; the
//! loop's timer channel reads the expiration count and fires whatever
//! is due. One fd serves the whole timer set: it is always armed for
//! the earliest pending deadline only.

use crate::sys::{close_fd, last_errno};
use revent_core::error::{ReactorError, ReactorResult};
use revent_core::{rtrace, rwarn};
use std::os::unix::io::RawFd;
use std::time::Instant;

pub(crate) struct TimerFd {
    fd: RawFd,
}

impl TimerFd {
    pub(crate) fn create() -> ReactorResult<Self> {
        let fd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(ReactorError::TimerFdCreate(last_errno()));
        }
        Ok(Self { fd })
    }

    #[inline]
    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    /// Arm for a single expiration at `deadline`. A deadline at or
    /// before now is clamped to a tiny delay - timerfd treats an
    /// all-zero value as disarm, and a due-now timer must still tick.
    pub(crate) fn arm(&self, deadline: Instant) {
        let delay = deadline.saturating_duration_since(Instant::now());
        let mut value = libc::timespec {
            tv_sec: delay.as_secs() as libc::time_t,
            tv_nsec: delay.subsec_nanos() as libc::c_long,
        };
        if value.tv_sec == 0 && value.tv_nsec < 100 {
            value.tv_nsec = 100;
        }
        self.settime(value);
    }

    /// Disarm: no pending deadline.
    pub(crate) fn disarm(&self) {
        self.settime(libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        });
    }

    fn settime(&self, value: libc::timespec) {
        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: value,
        };
        let ret = unsafe { libc::timerfd_settime(self.fd, 0, &spec, std::ptr::null_mut()) };
        if ret < 0 {
            // Recoverable in the sense that the loop keeps running, but
            // timers will stall until the next successful arm.
            rwarn!("TimerFd::settime: errno {}", last_errno());
        }
    }

    /// Read and discard the expiration count.
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
            // EAGAIN happens when a wakeup raced the arm; harmless.
            if errno != libc::EAGAIN {
                rwarn!("TimerFd::drain: read failed, errno {}", errno);
            }
            return 0;
        }
        if ret != std::mem::size_of::<u64>() as isize {
            rwarn!("TimerFd::drain: read {} bytes instead of 8", ret);
            return 0;
        }
        rtrace!("TimerFd::drain: {} expirations", count);
        count
    }
}

impl Drop for TimerFd {
    fn drop(&mut self) {
        close_fd(self.fd);
        self.fd = -1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fires_after_deadline() {
        let tfd = TimerFd::create().unwrap();
        tfd.arm(Instant::now() + Duration::from_millis(20));
        assert_eq!(tfd.drain(), 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(tfd.drain(), 1);
    }

    #[test]
    fn test_due_now_deadline_still_fires() {
        let tfd = TimerFd::create().unwrap();
        tfd.arm(Instant::now() - Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(tfd.drain(), 1);
    }

    #[test]
    fn test_disarm_cancels_pending() {
        let tfd = TimerFd::create().unwrap();
        tfd.arm(Instant::now() + Duration::from_millis(10));
        tfd.disarm();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(tfd.drain(), 0);
    }
}
