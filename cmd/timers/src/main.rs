//! Timer example
//!
//! One-shot timers, a repeating tick, self-rescheduling, and
//! cancellation, all on a single loop thread.
//!
//! # Environment Variables
//!
//! - `REVENT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use revent::EventLoop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    println!("=== revent Timer Example ===\n");

    let mut lp = EventLoop::new();
    let start = Instant::now();

    lp.run_after(Duration::from_millis(250), move |_lp| {
        println!("[{:>6.0?}] one-shot fired", start.elapsed());
    });

    // A repeating tick; successive expirations are computed from the
    // schedule, not the fire time, so the cadence does not drift.
    let ticks = Arc::new(AtomicUsize::new(0));
    let t = ticks.clone();
    let tick_id = lp.run_every(Duration::from_millis(200), move |_lp| {
        let n = t.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{:>6.0?}] tick {}", start.elapsed(), n);
    });

    // This one never fires.
    let doomed = lp.run_after(Duration::from_millis(500), |_lp| {
        println!("you should not see this");
    });
    lp.cancel(doomed);

    // Stop the tick after a second, quit shortly after.
    lp.run_after(Duration::from_millis(1100), move |lp| {
        println!("[{:>6.0?}] cancelling the tick", start.elapsed());
        lp.cancel(tick_id);
        lp.run_after(Duration::from_millis(200), |lp| lp.quit());
    });

    lp.loop_run();

    println!("\nticks seen: {}", ticks.load(Ordering::SeqCst));
    println!("=== Example Complete ===");
}
