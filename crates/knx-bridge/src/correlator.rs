// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request correlation.
//!
//! Every request handed to the engine carries a [`RequestToken`]. The
//! correlator owns the caller context for that token until the matching
//! engine event arrives, at which point the entry is removed and the
//! context is echoed back to the caller exactly once.
//!
//! Tokens are never reused within a correlator. An event for a token that is
//! not (or no longer) pending is dropped.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dispatch::{CallbackTable, Event};
use crate::error::{BridgeError, Result};
use crate::payload::{self, ContentFormat, RenderedPayload};
use crate::status::Status;

/// Opaque handle linking an engine event to its pending context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Raw value, for engines that carry the token as an integer.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Rebuild a token from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller context echoed back in the client-response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Device identifier the request was addressed to.
    pub identifier: String,
    /// Target path.
    pub path: String,
    /// Free-form caller tag.
    pub tag: String,
}

/// What a pending token stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// A GET/POST/PUT/DELETE awaiting its response.
    Request(RequestContext),
    /// An open discovery session.
    Discovery { continuous: bool },
    /// A secure handshake with the named device.
    Handshake { identifier: String },
}

/// Token table.
#[derive(Debug)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestToken, Pending>>,
    next: AtomicU64,
    capacity: usize,
}

impl Correlator {
    /// Create a correlator allowing at most `capacity` pending entries
    /// (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
            capacity,
        }
    }

    /// Register a pending entry and return its token.
    ///
    /// Must be called before the request is handed to the engine; if the
    /// engine then refuses it, call [`discard`](Self::discard).
    pub fn begin(&self, pending: Pending) -> Result<RequestToken> {
        let mut table = self.pending.lock();
        if self.capacity != 0 && table.len() >= self.capacity {
            log::warn!("[correlator] {} requests pending, refusing new one", table.len());
            return Err(BridgeError::TooManyPending(self.capacity));
        }
        let token = RequestToken(self.next.fetch_add(1, Ordering::Relaxed));
        table.insert(token, pending);
        log::trace!("[correlator] begin {}", token);
        Ok(token)
    }

    /// Drop an entry whose request never reached the engine.
    pub fn discard(&self, token: RequestToken) {
        if self.pending.lock().remove(&token).is_some() {
            log::trace!("[correlator] discarded {}", token);
        }
    }

    /// Remove and return the entry for `token`.
    pub fn take(&self, token: RequestToken) -> Option<Pending> {
        self.pending.lock().remove(&token)
    }

    /// Close a handshake and return the device identifier it was started for.
    ///
    /// Tokens of other kinds are left pending.
    pub fn take_handshake(&self, token: RequestToken) -> Option<String> {
        let mut table = self.pending.lock();
        match table.remove(&token)? {
            Pending::Handshake { identifier } => Some(identifier),
            other => {
                table.insert(token, other);
                None
            }
        }
    }

    /// Resolve a discovery reply token.
    ///
    /// Returns `true` if `token` names an open discovery session. Single-shot
    /// sessions are closed by this call; continuous ones stay open.
    pub fn accept_discovery_reply(&self, token: RequestToken) -> bool {
        let mut table = self.pending.lock();
        match table.get(&token) {
            Some(Pending::Discovery { continuous: true }) => true,
            Some(Pending::Discovery { continuous: false }) => {
                table.remove(&token);
                true
            }
            _ => false,
        }
    }

    /// Complete a request: decode the payload and deliver the client-response.
    ///
    /// Non-success statuses are delivered with an `"error"` format and empty
    /// payload. Returns `false` (and dispatches nothing) if `token` is not a
    /// pending request.
    pub fn complete(
        &self,
        token: RequestToken,
        status: Status,
        format: ContentFormat,
        bytes: &[u8],
        callbacks: &CallbackTable,
    ) -> bool {
        let context = {
            let mut table = self.pending.lock();
            match table.remove(&token) {
                Some(Pending::Request(ctx)) => ctx,
                Some(other) => {
                    table.insert(token, other);
                    log::debug!("[correlator] {} is not a request, response ignored", token);
                    return false;
                }
                None => {
                    log::debug!("[correlator] response for unknown token {}", token);
                    return false;
                }
            }
        };

        let rendered = if status.is_success() {
            payload::render(format, bytes)
        } else {
            RenderedPayload::error()
        };
        log::debug!(
            "[correlator] {} {} {} -> {} ({} bytes {})",
            token,
            context.identifier,
            context.path,
            status,
            rendered.size(),
            rendered.format
        );

        callbacks.dispatch(&Event::ClientResponse {
            identifier: context.identifier,
            status,
            format: rendered.format.name(),
            tag: context.tag,
            path: context.path,
            payload: rendered.text,
        });
        true
    }

    /// Abandon every pending entry. Returns how many were dropped.
    pub fn abandon_all(&self) -> usize {
        let dropped = std::mem::take(&mut *self.pending.lock()).len();
        if dropped > 0 {
            log::debug!("[correlator] abandoned {} pending entries", dropped);
        }
        dropped
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(0)
    }
}
