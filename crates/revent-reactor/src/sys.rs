//! Small syscall helpers shared by the fd wrappers and pollers.

/// Raw errno of the last failing syscall on this thread.
#[inline]
pub(crate) fn last_errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Close a descriptor, ignoring errors (used from Drop impls).
#[inline]
pub(crate) fn close_fd(fd: libc::c_int) {
    if fd >= 0 {
        unsafe {
            libc::close(fd);
        }
    }
}
