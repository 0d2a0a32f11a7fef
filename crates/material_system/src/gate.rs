//! Single-use load gate
//!
//! A [`ManualGate`] is created by the thread that owns a load and set exactly
//! once when the load finishes. Any number of threads can wait for it. The
//! owner holds a [`LoadTicket`] which sets the gate when dropped, so every exit
//! path of a load (including early returns and unwinding) releases waiters.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct GateState {
    signaled: bool,
    owner: Option<ThreadId>,
}

/// One-shot latch released by the owning loader
#[derive(Debug)]
pub struct ManualGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl ManualGate {
    /// Create an unsignaled gate owned by the calling thread
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                signaled: false,
                owner: Some(thread::current().id()),
            }),
            released: Condvar::new(),
        }
    }

    /// Create a gate that is already set
    pub fn signaled() -> Self {
        Self {
            state: Mutex::new(GateState {
                signaled: true,
                owner: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Set the gate and wake all waiters
    ///
    /// Returns `false` if the gate was already set.
    pub fn set(&self) -> bool {
        let mut state = self.state.lock();
        if state.signaled {
            return false;
        }
        state.signaled = true;
        state.owner = None;
        self.released.notify_all();
        true
    }

    /// Whether the gate has been set
    pub fn is_set(&self) -> bool {
        self.state.lock().signaled
    }

    /// Whether the calling thread owns the unfinished load
    pub fn is_owned_by_current_thread(&self) -> bool {
        let state = self.state.lock();
        !state.signaled && state.owner == Some(thread::current().id())
    }

    /// Block until the gate is set
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.signaled {
            self.released.wait(&mut state);
        }
    }

    /// Block until the gate is set, logging a warning every `interval`
    pub fn wait_with_diagnostics(&self, name: &str, interval: Option<Duration>) {
        let Some(interval) = interval else {
            self.wait();
            return;
        };

        let started = Instant::now();
        let mut state = self.state.lock();
        while !state.signaled {
            if self.released.wait_for(&mut state, interval).timed_out() && !state.signaled {
                log::warn!(
                    "Still waiting for material {} after {:.1}s",
                    name,
                    started.elapsed().as_secs_f32()
                );
            }
        }
    }
}

impl Default for ManualGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of an in-flight load
///
/// Dropping the ticket sets the gate.
#[derive(Debug)]
pub struct LoadTicket {
    gate: Arc<ManualGate>,
}

impl LoadTicket {
    /// Take ownership of a gate
    pub fn new(gate: Arc<ManualGate>) -> Self {
        Self { gate }
    }

    /// The gate waiters block on
    pub fn gate(&self) -> &Arc<ManualGate> {
        &self.gate
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        self.gate.set();
    }
}
