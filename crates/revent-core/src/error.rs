//! Error types for the revent reactor

use core::fmt;

/// Result type for reactor operations
pub type ReactorResult<T> = Result<T, ReactorError>;

/// Errors that can occur inside the reactor.
///
/// Variants carrying an `i32` hold the raw errno from the failing
/// syscall. Backend construction failures are never recoverable at
/// runtime; callers at the public boundary log and panic on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactorError {
    /// eventfd(2) creation failed
    EventFdCreate(i32),

    /// timerfd_create(2) failed
    TimerFdCreate(i32),

    /// Poller backend creation failed (epoll_create1 etc.)
    PollerCreate(i32),

    /// A descriptor registration/modification call failed
    PollerControl(i32),

    /// Operation referenced a channel id that is not registered
    ChannelNotRegistered,

    /// Generic OS error with errno
    Os(i32),
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorError::EventFdCreate(e) => write!(f, "eventfd creation failed: errno {}", e),
            ReactorError::TimerFdCreate(e) => write!(f, "timerfd creation failed: errno {}", e),
            ReactorError::PollerCreate(e) => write!(f, "poller creation failed: errno {}", e),
            ReactorError::PollerControl(e) => write!(f, "poller control failed: errno {}", e),
            ReactorError::ChannelNotRegistered => write!(f, "channel not registered"),
            ReactorError::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for ReactorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_errno() {
        let e = ReactorError::TimerFdCreate(22);
        assert!(e.to_string().contains("22"));
        let e = ReactorError::Os(11);
        assert!(e.to_string().contains("11"));
    }

    #[test]
    fn test_eq() {
        assert_eq!(ReactorError::Os(9), ReactorError::Os(9));
        assert_ne!(ReactorError::Os(9), ReactorError::PollerCreate(9));
    }
}
