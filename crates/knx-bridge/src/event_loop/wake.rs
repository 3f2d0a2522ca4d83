// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deadline-or-signal wake primitive for the event-loop worker.
//!
//! # Architecture
//! - Atomic flag so `notify()` from caller threads is cheap when the worker
//!   is busy polling
//! - Condvar for the idle wait, bounded by the engine's next timer deadline
//!
//! A notification that arrives while the worker is not waiting is latched and
//! consumed by the next wait, so no signal is lost between poll and sleep.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Another thread called `notify()`.
    Signaled,
    /// The deadline passed.
    Deadline,
}

/// Wake notification with a latched pending flag.
#[derive(Debug)]
pub struct WakeSignal {
    /// Latched notification
    pending: AtomicBool,
    /// True while the worker is parked on the condvar
    sleeping: Mutex<bool>,
    condvar: Condvar,
}

impl WakeSignal {
    #[inline]
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            sleeping: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Latch a wake-up and rouse the worker if it is parked.
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        if *self.sleeping.lock() {
            self.condvar.notify_one();
        }
    }

    /// Whether a notification is latched (does not consume it).
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until notified or until `deadline` passes.
    ///
    /// With no deadline, waits for a notification only. A deadline already in
    /// the past returns [`WakeReason::Deadline`] immediately unless a
    /// notification is latched.
    pub fn wait_until(&self, deadline: Option<Instant>) -> WakeReason {
        if self.pending.swap(false, Ordering::Acquire) {
            return WakeReason::Signaled;
        }

        let mut sleeping = self.sleeping.lock();
        *sleeping = true;
        let reason = loop {
            if self.pending.swap(false, Ordering::Acquire) {
                break WakeReason::Signaled;
            }
            match deadline {
                Some(at) => {
                    if Instant::now() >= at {
                        break WakeReason::Deadline;
                    }
                    // Spurious wake-ups loop back to the checks above.
                    let _ = self.condvar.wait_until(&mut sleeping, at);
                }
                None => self.condvar.wait(&mut sleeping),
            }
        };
        *sleeping = false;
        reason
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}
