//! Basic reactor example
//!
//! Registers a pipe with the loop, writes to it from a second thread,
//! and echoes what arrives until the writer hangs up.
//!
//! # Environment Variables
//!
//! - `REVENT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `REVENT_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `REVENT_USE_POLL=1` - Use the poll(2) backend instead of epoll

use revent::{rinfo, CallbackSet, EventLoop};
use std::thread;
use std::time::Duration;

// REVENT_LOG_LEVEL=debug cargo run -p revent-basic
fn main() {
    println!("=== revent Basic Example ===\n");

    let mut fds = [0 as libc::c_int; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
    assert_eq!(rc, 0, "pipe2 failed");
    let (rd, wr) = (fds[0], fds[1]);

    let mut lp = EventLoop::new();

    let id = lp.register_channel(
        rd,
        CallbackSet::new()
            .with_read(move |lp, _when| {
                let mut buf = [0u8; 256];
                let n = unsafe { libc::read(rd, buf.as_mut_ptr() as *mut libc::c_void, 256) };
                if n > 0 {
                    let msg = String::from_utf8_lossy(&buf[..n as usize]);
                    println!("[loop, iter {}] read: {}", lp.iteration(), msg.trim_end());
                }
            })
            .with_close(move |lp| {
                println!("[loop] writer hung up, quitting");
                lp.quit();
            }),
    );
    lp.enable_reading(id);

    let writer = thread::spawn(move || {
        for i in 1..=3 {
            let line = format!("message {}\n", i);
            unsafe {
                libc::write(wr, line.as_ptr() as *const libc::c_void, line.len());
            }
            thread::sleep(Duration::from_millis(300));
        }
        unsafe { libc::close(wr) }; // triggers HUP on the read side
    });

    rinfo!("looping until the writer closes its end");
    lp.loop_run();

    writer.join().unwrap();
    lp.disable_all(id);
    lp.remove_channel(id);
    unsafe { libc::close(rd) };

    println!("\n=== Example Complete ===");
}
