//! EventLoop - the reactor core.
//!
//! One loop per thread. The loop owns a poller, a timer queue, and the
//! registered channels; it blocks in the poller, dispatches ready
//! channels, then drains the pending-task queue, until quit.
//!
//! # Ownership and threading
//!
//! `EventLoop` is deliberately not `Send`: it is created on the thread
//! that will run it and can never leave. Every structure it owns is
//! single-writer with no locking. The one cross-thread surface is
//! [`LoopHandle`]: a cloneable handle over the shared state (pending
//! queue + wakeup eventfd + quit flag) that marshals work onto the loop
//! thread. A queued task receives `&mut EventLoop` when it runs, so
//! foreign threads can register channels and schedule timers without
//! ever touching loop structures directly.
//!
//! # Blocking behavior
//!
//! The poller wait is the only suspension point. Callbacks and queued
//! tasks run to completion, one at a time; a slow callback stalls the
//! whole loop. That is a documented constraint, not a bug - long work
//! belongs on another thread (or another loop), with results posted
//! back through `queue_in_loop`.

use crate::channel::{CallbackSet, Channel, ChannelArena, ChannelId};
use crate::config::LoopConfig;
use crate::poller::{create_poller, Poller};
use crate::timer::{Timer, TimerCallback, TimerId, TimerQueue};
use crate::tls;
use crate::wakeup::WakeupFd;
use revent_core::events::EventSet;
use revent_core::kprint::{level_enabled, LogLevel};
use revent_core::{rdebug, rerror, rtrace};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// A unit of work marshaled onto the loop thread.
pub(crate) type PendingFunctor = Box<dyn FnOnce(&mut EventLoop) + Send>;

/// State shared between the loop thread and `LoopHandle`s.
pub(crate) struct LoopShared {
    owner: ThreadId,
    quit: AtomicBool,
    /// True while the loop is inside a pending-task drain
    calling_pending: AtomicBool,
    pending: Mutex<Vec<PendingFunctor>>,
    wakeup: WakeupFd,
}

impl LoopShared {
    #[inline]
    fn is_in_loop_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn queue(&self, f: PendingFunctor) {
        {
            self.pending.lock().unwrap().push(f);
        }
        // Wake unless the owner thread queued from ordinary code - the
        // loop reaches the drain step of the current iteration anyway.
        // An owner-thread enqueue from inside the drain DOES wake:
        // the swapped-out batch is already fixed, and without a wakeup
        // the new task would sit until some unrelated I/O.
        if !self.is_in_loop_thread() || self.calling_pending.load(Ordering::Acquire) {
            self.wakeup.notify();
        }
    }

    fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
        if !self.is_in_loop_thread() {
            self.wakeup.notify();
        }
    }
}

/// Cloneable, `Send + Sync` handle to an `EventLoop`, valid from any
/// thread. See the module docs for the marshaling contract.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Whether the calling thread owns the loop.
    #[inline]
    pub fn is_in_loop_thread(&self) -> bool {
        self.shared.is_in_loop_thread()
    }

    /// Run `f` on the loop thread. Called from the owner thread it runs
    /// inline, preserving ordering with surrounding code; from any other
    /// thread it is queued like [`queue_in_loop`](Self::queue_in_loop).
    ///
    /// Inline execution cannot receive the loop reference (the caller
    /// may not hold it); tasks that need the loop go through
    /// `queue_in_loop`.
    pub fn run_in_loop(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_in_loop_thread() {
            f();
        } else {
            self.shared.queue(Box::new(move |_lp| f()));
        }
    }

    /// Queue `f` for the loop thread's next drain pass. Tasks queued
    /// from one thread run in their enqueue order; tasks queued during
    /// a drain run in the next drain, never recursively.
    pub fn queue_in_loop(&self, f: impl FnOnce(&mut EventLoop) + Send + 'static) {
        self.shared.queue(Box::new(f));
    }

    /// Request loop termination. Level-triggered and idempotent: safe
    /// from any thread, any number of times, before or after the loop
    /// stops. Takes effect at the next iteration boundary.
    pub fn quit(&self) {
        self.shared.request_quit();
    }

    /// Force the poller to return early. Rarely needed directly -
    /// `queue_in_loop` and `quit` wake the loop themselves.
    pub fn wakeup(&self) {
        self.shared.wakeup.notify();
    }

    /// Schedule `cb` at an absolute time. Any thread; the insertion is
    /// marshaled onto the loop thread, the id is valid immediately.
    pub fn run_at(
        &self,
        when: Instant,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        let id = TimerId::next();
        self.shared.queue(Box::new(move |lp| {
            lp.add_timer_marshaled(id, when, None, Box::new(cb));
        }));
        id
    }

    /// Schedule `cb` after a delay. Any thread.
    pub fn run_after(
        &self,
        delay: Duration,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        self.run_at(Instant::now() + delay, cb)
    }

    /// Schedule `cb` every `interval`, first firing one interval from
    /// now. Any thread. Successive expirations are computed from the
    /// previous scheduled expiration, not the fire time.
    pub fn run_every(
        &self,
        interval: Duration,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        let id = TimerId::next();
        let when = Instant::now() + interval;
        self.shared.queue(Box::new(move |lp| {
            lp.add_timer_marshaled(id, when, Some(interval), Box::new(cb));
        }));
        id
    }

    /// Cancel a scheduled timer. Any thread; racing against the firing
    /// is expected and harmless (already-fired one-shots are a no-op).
    pub fn cancel(&self, id: TimerId) {
        self.shared.queue(Box::new(move |lp| {
            lp.cancel_timer_marshaled(id);
        }));
    }

    /// Number of tasks waiting for the next drain.
    pub fn pending_tasks(&self) -> usize {
        self.shared.pending.lock().unwrap().len()
    }
}

fn ignore_sigpipe_once() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}

/// The reactor: blocking-wait / dispatch / drain, once per iteration.
pub struct EventLoop {
    shared: Arc<LoopShared>,
    poller: Box<dyn Poller>,
    channels: ChannelArena,
    timers: TimerQueue,
    wakeup_channel: ChannelId,
    /// Ready channels of the in-progress iteration
    active: Vec<ChannelId>,
    /// Index into `active` while dispatching
    active_cursor: usize,
    current_active: Option<ChannelId>,
    event_handling: bool,
    started: bool,
    iteration: u64,
    poll_return_time: Instant,
    poll_timeout_ms: i32,
}

impl EventLoop {
    /// Create a loop owned by the calling thread, with the default
    /// (environment-driven) config.
    ///
    /// # Panics
    ///
    /// If this thread already owns a live loop, or if the wakeup
    /// eventfd, timerfd, or poller backend cannot be created. These are
    /// construction-time failures with no recovery path.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Create a loop with an explicit config.
    pub fn with_config(config: LoopConfig) -> Self {
        if !tls::register_loop() {
            rerror!(
                "EventLoop: another loop already exists in thread {:?}",
                thread::current().id()
            );
            panic!("EventLoop: another EventLoop already exists in this thread");
        }
        if config.ignore_sigpipe {
            ignore_sigpipe_once();
        }

        let wakeup = match WakeupFd::create() {
            Ok(w) => w,
            Err(e) => {
                tls::unregister_loop();
                rerror!("EventLoop: {}", e);
                panic!("EventLoop: wakeup fd creation failed: {}", e);
            }
        };
        let timers = match TimerQueue::new() {
            Ok(t) => t,
            Err(e) => {
                tls::unregister_loop();
                rerror!("EventLoop: {}", e);
                panic!("EventLoop: timer queue creation failed: {}", e);
            }
        };
        let shared = Arc::new(LoopShared {
            owner: thread::current().id(),
            quit: AtomicBool::new(false),
            calling_pending: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            wakeup,
        });

        let mut lp = EventLoop {
            shared,
            poller: create_poller(config.poller, config.event_buffer),
            channels: ChannelArena::new(),
            timers,
            wakeup_channel: ChannelId(u32::MAX),
            active: Vec::new(),
            active_cursor: 0,
            current_active: None,
            event_handling: false,
            started: false,
            iteration: 0,
            poll_return_time: Instant::now(),
            poll_timeout_ms: config.poll_timeout_ms(),
        };

        // The wakeup channel is always reading; its callback just
        // discards the eventfd counter.
        let wakeup_fd = lp.shared.wakeup.fd();
        let wk = lp.register_channel(
            wakeup_fd,
            CallbackSet::new().with_read(|lp, _t| {
                lp.shared.wakeup.drain();
            }),
        );
        lp.enable_reading(wk);
        lp.wakeup_channel = wk;

        let timer_fd = lp.timers.fd();
        let tk = lp.register_channel(
            timer_fd,
            CallbackSet::new().with_read(|lp, t| lp.process_expired_timers(t)),
        );
        lp.enable_reading(tk);
        lp.timers.set_channel(tk);

        rdebug!(
            "EventLoop: created in thread {:?} ({} backend)",
            lp.shared.owner,
            lp.poller.name()
        );
        lp
    }

    /// Handle for other threads.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: self.shared.clone(),
        }
    }

    // ========================================================================
    // The loop proper
    // ========================================================================

    /// Run the reactor until [`quit`](Self::quit) is requested.
    ///
    /// Must be called exactly once, from the owning thread.
    ///
    /// # Panics
    ///
    /// On re-entry (including from a callback) or from a foreign thread.
    pub fn loop_run(&mut self) {
        self.check_in_loop_thread("loop_run");
        if self.started {
            rerror!("EventLoop::loop_run: re-entered");
            panic!("EventLoop::loop_run: loop_run may be called exactly once");
        }
        self.started = true;
        rdebug!("EventLoop: start looping in thread {:?}", self.shared.owner);

        while !self.shared.quit.load(Ordering::SeqCst) {
            self.active.clear();
            self.poll_return_time =
                self.poller
                    .poll(self.poll_timeout_ms, &mut self.channels, &mut self.active);
            self.iteration += 1;
            if level_enabled(LogLevel::Trace) {
                self.trace_active_channels();
            }

            self.event_handling = true;
            self.active_cursor = 0;
            while self.active_cursor < self.active.len() {
                let id = self.active[self.active_cursor];
                self.current_active = Some(id);
                self.dispatch_channel(id);
                self.active_cursor += 1;
            }
            self.current_active = None;
            self.event_handling = false;

            self.do_pending_functors();
        }

        rdebug!(
            "EventLoop: stop looping after {} iterations",
            self.iteration
        );
    }

    /// Request termination; see [`LoopHandle::quit`].
    pub fn quit(&self) {
        self.shared.request_quit();
    }

    fn dispatch_channel(&mut self, id: ChannelId) {
        let revents = match self.channels.get(id) {
            Some(ch) => ch.revents(),
            None => return,
        };
        let Some(mut cbs) = self.channels.take_callbacks(id) else {
            return;
        };
        let recv_time = self.poll_return_time;

        // Fixed priority order: close, read, write, error. A hang-up
        // that still has readable data goes to the read callback first,
        // so a half-open peer's final bytes are not lost.
        if revents.contains(EventSet::HUP) && !revents.contains(EventSet::IN) {
            if let Some(cb) = cbs.close.as_mut() {
                cb(self);
            }
        }
        if revents.intersects(EventSet::READ_EVENTS) {
            if let Some(cb) = cbs.read.as_mut() {
                cb(self, recv_time);
            }
        }
        if revents.intersects(EventSet::OUT) {
            if let Some(cb) = cbs.write.as_mut() {
                cb(self);
            }
        }
        if revents.intersects(EventSet::ERR | EventSet::NVAL) {
            if let Some(cb) = cbs.error.as_mut() {
                cb(self);
            }
        }

        self.channels.restore_callbacks(id, cbs);
    }

    /// Swap the queue out under the lock, run the batch outside it.
    /// Tasks queued by a running task land in the fresh queue and run
    /// next drain - each pass is finite, recursion impossible.
    fn do_pending_functors(&mut self) {
        self.shared.calling_pending.store(true, Ordering::Release);
        let functors: Vec<PendingFunctor> = {
            let mut q = self.shared.pending.lock().unwrap();
            std::mem::take(&mut *q)
        };
        if !functors.is_empty() {
            rtrace!("EventLoop: draining {} pending tasks", functors.len());
        }
        for f in functors {
            f(self);
        }
        self.shared.calling_pending.store(false, Ordering::Release);
    }

    fn trace_active_channels(&self) {
        for &id in &self.active {
            if let Some(ch) = self.channels.get(id) {
                rtrace!(
                    "EventLoop: active {{fd={} revents={:?}}}",
                    ch.fd(),
                    ch.revents()
                );
            }
        }
    }

    // ========================================================================
    // Channels (owning thread only)
    // ========================================================================

    /// Register a descriptor with its callbacks. No interest yet; call
    /// `enable_reading`/`set_interest` to start receiving events. The
    /// fd is not owned: remove the channel before closing it.
    pub fn register_channel(&mut self, fd: RawFd, callbacks: CallbackSet) -> ChannelId {
        self.check_in_loop_thread("register_channel");
        let id = self.channels.insert(Channel::new(fd, callbacks));
        rtrace!("EventLoop: registered channel {:?} fd={}", id, fd);
        id
    }

    /// Replace a channel's interest mask and sync the poller.
    ///
    /// # Panics
    ///
    /// On an unregistered id or a foreign thread.
    pub fn set_interest(&mut self, id: ChannelId, interest: EventSet) {
        self.check_in_loop_thread("set_interest");
        match self.channels.get_mut(id) {
            Some(ch) => ch.set_interest(interest),
            None => {
                rerror!("EventLoop::set_interest: unknown channel {:?}", id);
                panic!("EventLoop::set_interest: channel not registered");
            }
        }
        self.poller.update_channel(id, &mut self.channels);
    }

    /// Add read-side interest (data and urgent data).
    pub fn enable_reading(&mut self, id: ChannelId) {
        let cur = self.interest_of(id);
        self.set_interest(id, cur | EventSet::IN | EventSet::PRI);
    }

    /// Add write interest.
    pub fn enable_writing(&mut self, id: ChannelId) {
        let cur = self.interest_of(id);
        self.set_interest(id, cur | EventSet::OUT);
    }

    /// Drop write interest (typical after an output buffer empties).
    pub fn disable_writing(&mut self, id: ChannelId) {
        let mut cur = self.interest_of(id);
        cur.remove(EventSet::OUT);
        self.set_interest(id, cur);
    }

    /// Clear all interest. The channel stays registered; only
    /// `remove_channel` detaches it.
    pub fn disable_all(&mut self, id: ChannelId) {
        self.set_interest(id, EventSet::NONE);
    }

    fn interest_of(&self, id: ChannelId) -> EventSet {
        match self.channels.get(id) {
            Some(ch) => ch.interest(),
            None => {
                rerror!("EventLoop: unknown channel {:?}", id);
                panic!("EventLoop: channel not registered");
            }
        }
    }

    /// Deregister a channel. The caller contract: interest must already
    /// be empty (`disable_all`), and the underlying fd must outlive the
    /// call.
    ///
    /// # Panics
    ///
    /// If interest is still nonzero, or when called from a callback
    /// while the channel is still pending dispatch later in the current
    /// ready batch (removing it would dispatch a freed channel).
    pub fn remove_channel(&mut self, id: ChannelId) {
        self.check_in_loop_thread("remove_channel");
        if id == self.wakeup_channel || self.timers.channel() == Some(id) {
            rerror!("EventLoop::remove_channel: {:?} is an internal channel", id);
            panic!("EventLoop::remove_channel: cannot remove an internal channel");
        }
        let Some(ch) = self.channels.get(id) else {
            rerror!("EventLoop::remove_channel: unknown channel {:?}", id);
            panic!("EventLoop::remove_channel: channel not registered");
        };
        if !ch.interest().is_empty() {
            rerror!(
                "EventLoop::remove_channel: channel {:?} fd={} still has interest {:?}",
                id,
                ch.fd(),
                ch.interest()
            );
            panic!("EventLoop::remove_channel: disable interest before removal");
        }
        if self.event_handling {
            let is_current = self.current_active == Some(id);
            let pending_later = self.active[self.active_cursor + 1..].contains(&id);
            if !is_current && pending_later {
                rerror!(
                    "EventLoop::remove_channel: channel {:?} is pending dispatch",
                    id
                );
                panic!("EventLoop::remove_channel: channel pending dispatch in this iteration");
            }
        }
        self.poller.remove_channel(id, &mut self.channels);
        self.channels.remove(id);
        rtrace!("EventLoop: removed channel {:?}", id);
    }

    /// Whether an id refers to a live channel.
    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.channels.contains(id)
    }

    // ========================================================================
    // Timers (owning thread only; foreign threads use LoopHandle)
    // ========================================================================

    /// Schedule `cb` at an absolute time.
    pub fn run_at(
        &mut self,
        when: Instant,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        self.check_in_loop_thread("run_at");
        let id = TimerId::next();
        self.timers.add(Timer::new(id, when, None, Box::new(cb)));
        id
    }

    /// Schedule `cb` after a delay.
    pub fn run_after(
        &mut self,
        delay: Duration,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        self.run_at(Instant::now() + delay, cb)
    }

    /// Schedule `cb` every `interval`, first firing one interval from now.
    pub fn run_every(
        &mut self,
        interval: Duration,
        cb: impl FnMut(&mut EventLoop) + Send + 'static,
    ) -> TimerId {
        self.check_in_loop_thread("run_every");
        let id = TimerId::next();
        self.timers
            .add(Timer::new(id, Instant::now() + interval, Some(interval), Box::new(cb)));
        id
    }

    /// Cancel a timer; unknown/already-fired ids are silent no-ops.
    pub fn cancel(&mut self, id: TimerId) {
        self.check_in_loop_thread("cancel");
        self.timers.cancel(id);
    }

    pub(crate) fn add_timer_marshaled(
        &mut self,
        id: TimerId,
        when: Instant,
        interval: Option<Duration>,
        cb: TimerCallback,
    ) {
        self.timers.add(Timer::new(id, when, interval, cb));
    }

    pub(crate) fn cancel_timer_marshaled(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }

    /// Timer channel read callback: fire everything due.
    fn process_expired_timers(&mut self, now: Instant) {
        let due = self.timers.begin_expiry(now);
        rtrace!("EventLoop: {} timers due", due.len());
        for mut t in due {
            (t.callback)(self);
            self.timers.finish_one(t);
        }
        self.timers.end_expiry();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Iterations completed so far.
    #[inline]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// When the poller last returned.
    #[inline]
    pub fn poll_return_time(&self) -> Instant {
        self.poll_return_time
    }

    /// Number of registered channels, including the internal wakeup and
    /// timer channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of pending timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Whether the calling thread owns this loop.
    #[inline]
    pub fn is_in_loop_thread(&self) -> bool {
        self.shared.is_in_loop_thread()
    }

    /// Assert the caller is the owning thread. A second line of defense:
    /// `EventLoop` is not `Send`, so safe code cannot trip this.
    pub fn assert_in_loop_thread(&self) {
        self.check_in_loop_thread("assert_in_loop_thread");
    }

    fn check_in_loop_thread(&self, what: &str) {
        if !self.shared.is_in_loop_thread() {
            rerror!(
                "EventLoop::{}: called from thread {:?}, loop owned by {:?}",
                what,
                thread::current().id(),
                self.shared.owner
            );
            panic!("EventLoop::{}: not called from the owning loop thread", what);
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        rdebug!("EventLoop: destroyed in thread {:?}", self.shared.owner);
        tls::unregister_loop();
    }
}
