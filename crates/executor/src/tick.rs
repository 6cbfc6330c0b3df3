//! Shared monotonic tick counter.
//!
//! `pause_until` jobs park their session's worker on this counter until
//! another party advances it far enough. It is a cooperative scheduling
//! point: the worker thread itself blocks, not the caller.

use parking_lot::{Condvar, Mutex};

use docsession_core::{Error, Result};
use tracing::debug;

/// Blocks workers until a shared tick is reached.
pub trait TickMonitor: Send + Sync {
    /// Block the calling thread until the counter reaches `tick`.
    ///
    /// # Errors
    ///
    /// Returns `InterruptedWait` if the wait is interrupted.
    fn await_until(&self, tick: u64) -> Result<()>;
}

#[derive(Debug, Default)]
struct TickState {
    current: u64,
    /// Bumped by every interrupt; a waiter that sees it change was interrupted
    generation: u64,
    waiters: usize,
}

/// Default [`TickMonitor`]: a counter that only moves forward.
#[derive(Debug, Default)]
pub struct TickCounter {
    state: Mutex<TickState>,
    changed: Condvar,
}

impl TickCounter {
    /// Counter starting at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick
    pub fn current(&self) -> u64 {
        self.state.lock().current
    }

    /// Move forward by one tick and return the new value.
    pub fn advance(&self) -> u64 {
        let mut state = self.state.lock();
        state.current += 1;
        self.changed.notify_all();
        state.current
    }

    /// Move forward to `tick`. Never moves the counter backward.
    pub fn advance_to(&self, tick: u64) -> u64 {
        let mut state = self.state.lock();
        if tick > state.current {
            state.current = tick;
            self.changed.notify_all();
        }
        state.current
    }

    /// Fail every wait currently blocked with `InterruptedWait`.
    ///
    /// Waits that start afterwards are unaffected.
    pub fn interrupt_waiters(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        debug!(target: "docsession::tick", waiters = state.waiters, "interrupting tick waiters");
        self.changed.notify_all();
    }

    /// Number of threads currently blocked in [`await_until`](TickMonitor::await_until)
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters
    }
}

impl TickMonitor for TickCounter {
    fn await_until(&self, tick: u64) -> Result<()> {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.waiters += 1;
        let result = loop {
            if state.current >= tick {
                break Ok(());
            }
            if state.generation != generation {
                break Err(Error::InterruptedWait { tick });
            }
            self.changed.wait(&mut state);
        };
        state.waiters -= 1;
        result
    }
}
