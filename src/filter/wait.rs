//! Unified blocking/cooperative waiting, resolving the Open Question of
//! whether the producer/consumer handshake should use a condvar or a
//! thread-free poll loop. Both backends share one `AtomicU8` state word
//! and the same acquire/release contract, so `current_state`/`is_ready`
//! behave identically regardless of which backend a query selects.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const NOT_READY: u8 = 0;
pub const READY: u8 = 1;
pub const TIMED_OUT: u8 = 2;

/// How a query wants `FilterInstance::await` to suspend.
#[derive(Clone)]
pub enum WaitStrategy {
    /// Park the calling OS thread on a condvar until signaled or the
    /// deadline elapses.
    Blocking,
    /// Never park a thread on a condvar; instead yield the CPU between
    /// polls of the shared state word. Appropriate for a caller that
    /// cannot afford a dedicated blocked thread per waiter and is
    /// willing to trade that for a polling loop.
    Cooperative,
}

/// The shared waiting primitive behind one `FilterInstance`.
pub struct Waiter {
    state: AtomicU8,
    strategy: WaitStrategy,
    blocking: Mutex<()>,
    condvar: Condvar,
}

impl Waiter {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            state: AtomicU8::new(NOT_READY),
            strategy,
            blocking: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub fn current_state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    pub fn is_terminal(&self) -> bool {
        self.current_state() != NOT_READY
    }

    fn notify_terminal(&self) {
        if let WaitStrategy::Blocking = self.strategy {
            let _guard = self.blocking.lock();
            self.condvar.notify_all();
        }
    }

    /// Transition `NOT_READY -> READY` if still not-ready; no-op
    /// (discarded) if already terminal. Returns whether this call
    /// performed the transition.
    pub fn signal_ready(&self) -> bool {
        let did = self
            .state
            .compare_exchange(NOT_READY, READY, Ordering::Release, Ordering::Acquire)
            .is_ok();
        if did {
            self.notify_terminal();
        }
        did
    }

    /// Force a terminal state without the not-ready precondition, used
    /// for query cancellation / upstream failure paths that must make
    /// every waiter observe termination regardless of current state.
    pub fn force_timeout(&self) {
        if self
            .state
            .compare_exchange(NOT_READY, TIMED_OUT, Ordering::Release, Ordering::Acquire)
            .is_ok()
        {
            self.notify_terminal();
        }
    }

    /// Block (or cooperatively wait) until `READY`/`TIMED_OUT`, or until
    /// `deadline` elapses, at which point a still-`NOT_READY` state is
    /// atomically moved to `TIMED_OUT`. Idempotent: subsequent calls
    /// after a terminal state observe it immediately.
    pub fn await_ready(self: &Arc<Self>, deadline: Instant) -> u8 {
        let current = self.current_state();
        if current != NOT_READY {
            return current;
        }
        match self.strategy {
            WaitStrategy::Blocking => self.await_blocking(deadline),
            WaitStrategy::Cooperative => self.await_cooperative(deadline),
        }
    }

    fn await_blocking(&self, deadline: Instant) -> u8 {
        let mut guard = self.blocking.lock();
        loop {
            let current = self.current_state();
            if current != NOT_READY {
                return current;
            }
            let now = Instant::now();
            if now >= deadline {
                self.force_timeout();
                return self.current_state();
            }
            let timeout = deadline - now;
            let wait_result = self.condvar.wait_for(&mut guard, timeout);
            if wait_result.timed_out() {
                let current = self.current_state();
                if current != NOT_READY {
                    return current;
                }
                self.force_timeout();
                return self.current_state();
            }
        }
    }

    /// Cooperative mode never parks a thread on a condvar: it re-polls
    /// the state word in a yield loop until another thread calls
    /// `signal_ready`/`force_timeout`, or the deadline elapses. This
    /// mirrors the blocking path's deadline handling without ever
    /// calling `Condvar::wait`, at the cost of a spinning caller.
    fn await_cooperative(&self, deadline: Instant) -> u8 {
        loop {
            let current = self.current_state();
            if current != NOT_READY {
                return current;
            }
            if Instant::now() >= deadline {
                self.force_timeout();
                return self.current_state();
            }
            std::thread::yield_now();
        }
    }

    pub fn remaining(deadline: Instant) -> Duration {
        deadline.saturating_duration_since(Instant::now())
    }
}
