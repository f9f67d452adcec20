//! Cross-thread injection example
//!
//! The loop runs on its own thread; worker threads queue closures and
//! schedule timers through a shared `LoopHandle`. Everything they queue
//! executes on the loop thread, in per-poster order.
//!
//! # Environment Variables
//!
//! - `REVENT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use revent::{rinfo, EventLoop};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== revent Cross-Thread Example ===\n");

    let (tx, rx) = mpsc::channel();
    let loop_thread = thread::spawn(move || {
        let mut lp = EventLoop::new();
        tx.send(lp.handle()).unwrap();
        rinfo!("loop thread {:?} running", thread::current().id());
        lp.loop_run();
        rinfo!("loop thread done after {} iterations", lp.iteration());
    });
    let handle = rx.recv().unwrap();

    let mut workers = Vec::new();
    for w in 0..3 {
        let handle = handle.clone();
        workers.push(thread::spawn(move || {
            for i in 0..3 {
                handle.queue_in_loop(move |lp| {
                    println!(
                        "[loop iter {}] task {} from worker {} (on {:?})",
                        lp.iteration(),
                        i,
                        w,
                        thread::current().id()
                    );
                });
                thread::sleep(Duration::from_millis(50));
            }
            // Timers can be scheduled from any thread too.
            handle.run_after(Duration::from_millis(100), move |_lp| {
                println!("[loop] deferred goodbye from worker {}", w);
            });
        }));
    }
    for w in workers {
        w.join().unwrap();
    }

    thread::sleep(Duration::from_millis(300));
    println!("\nall workers done, stopping the loop");
    handle.quit();
    loop_thread.join().unwrap();

    println!("=== Example Complete ===");
}
