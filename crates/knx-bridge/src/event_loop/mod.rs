// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event loop driving the protocol engine.
//!
//! ## States
//!
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Draining ──join──▶ Stopped
//! ```
//!
//! The quit flag is monotonic: once `stop()` has run the loop cannot be
//! started again.
//!
//! ## Poll cycle (worker thread)
//!
//! ```text
//! loop {
//!     next = driver.poll_cycle()      // engine lock held only inside
//!     if quit { break }
//!     wake.wait_until(next)           // deadline, signal, or forever
//! }
//! ```
//!
//! In cooperative mode no worker is spawned and the host calls the poll
//! cycle itself; `signal()` then only latches the wake flag.

mod wake;

pub use wake::{WakeReason, WakeSignal};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use crate::config::Threading;
use crate::error::{BridgeError, Result};

/// Worker thread name.
pub const WORKER_THREAD_NAME: &str = "knx-bridge-event";

/// Event-loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Draining,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Stopped => "stopped",
            LoopState::Running => "running",
            LoopState::Draining => "draining",
        };
        f.write_str(s)
    }
}

/// One iteration of engine work, run by the worker or by the host.
pub trait PollCycle: Send + Sync + 'static {
    /// Poll the engine and deliver whatever it produced.
    ///
    /// Returns the engine's next timer deadline.
    fn poll_cycle(&self) -> Option<Instant>;
}

/// Worker lifecycle and wake-up coordination.
pub struct EventLoop {
    state: Mutex<LoopState>,
    quit: Arc<AtomicBool>,
    wake: Arc<WakeSignal>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Mutex<Option<ThreadId>>,
}

impl EventLoop {
    pub fn new(wake: Arc<WakeSignal>) -> Self {
        Self {
            state: Mutex::new(LoopState::Stopped),
            quit: Arc::new(AtomicBool::new(false)),
            wake,
            worker: Mutex::new(None),
            worker_id: Mutex::new(None),
        }
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Whether the loop accepts work.
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Whether `stop()` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Transition `Stopped → Running`, spawning the worker in
    /// [`Threading::Worker`] mode.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if running, `ShutDown` after `stop()`, `Io` if the
    /// worker thread cannot be spawned.
    pub fn start<D: PollCycle>(&self, driver: Arc<D>, threading: Threading) -> Result<()> {
        let mut state = self.state.lock();
        if self.is_shut_down() {
            return Err(BridgeError::ShutDown);
        }
        if *state != LoopState::Stopped {
            return Err(BridgeError::AlreadyRunning);
        }

        if threading == Threading::Worker {
            let quit = Arc::clone(&self.quit);
            let wake = Arc::clone(&self.wake);
            let handle = thread::Builder::new()
                .name(WORKER_THREAD_NAME.into())
                .spawn(move || worker_loop(driver, quit, wake))?;
            *self.worker_id.lock() = Some(handle.thread().id());
            *self.worker.lock() = Some(handle);
        }

        *state = LoopState::Running;
        log::debug!("[event-loop] started ({:?})", threading);
        Ok(())
    }

    /// Shorten the worker's current wait. No-op unless running.
    pub fn signal(&self) {
        if self.is_shut_down() {
            return;
        }
        if *self.state.lock() == LoopState::Running {
            self.wake.notify();
        }
    }

    /// Set the quit flag, wake the worker and join it.
    ///
    /// Returns `true` if this call performed the shutdown; later calls are
    /// no-ops returning `false`. When called from the worker itself (e.g.
    /// from an event handler) the join is skipped and the worker exits after
    /// the current cycle.
    pub fn stop(&self) -> bool {
        if self.quit.swap(true, Ordering::AcqRel) {
            return false;
        }

        *self.state.lock() = LoopState::Draining;
        self.wake.notify();

        let on_worker = *self.worker_id.lock() == Some(thread::current().id());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if on_worker {
                log::debug!("[event-loop] stop requested from worker, not joining");
            } else if handle.join().is_err() {
                log::error!("[event-loop] worker panicked");
            }
        }

        *self.state.lock() = LoopState::Stopped;
        log::debug!("[event-loop] stopped");
        true
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("state", &self.state())
            .field("quit", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop<D: PollCycle>(driver: Arc<D>, quit: Arc<AtomicBool>, wake: Arc<WakeSignal>) {
    log::debug!("[event-loop] worker thread running");

    while !quit.load(Ordering::Acquire) {
        let next = driver.poll_cycle();
        if quit.load(Ordering::Acquire) {
            break;
        }
        match wake.wait_until(next) {
            WakeReason::Signaled => log::trace!("[event-loop] woken by signal"),
            WakeReason::Deadline => log::trace!("[event-loop] timer deadline reached"),
        }
    }

    log::debug!("[event-loop] worker thread exiting");
}
