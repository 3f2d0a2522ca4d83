// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callback table and event dispatch.
//!
//! One handler slot per [`EventCategory`]. Installing replaces the previous
//! handler and returns it. Dispatching to an empty slot is a silent no-op.
//!
//! Handlers run on whichever thread dispatches: the event-loop worker for
//! engine events, the calling thread for local notifications. The table lock
//! is released before the handler is called, so a handler may install other
//! handlers or issue new requests.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::status::Status;

/// Event categories, one handler slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    StateChanged,
    ResourceChanged,
    ClientResponse,
    DiscoveryResult,
    HandshakeResult,
    GatewayNotification,
}

impl EventCategory {
    /// All categories, in slot order.
    pub const ALL: [EventCategory; 6] = [
        EventCategory::StateChanged,
        EventCategory::ResourceChanged,
        EventCategory::ClientResponse,
        EventCategory::DiscoveryResult,
        EventCategory::HandshakeResult,
        EventCategory::GatewayNotification,
    ];

    fn slot(self) -> usize {
        match self {
            EventCategory::StateChanged => 0,
            EventCategory::ResourceChanged => 1,
            EventCategory::ClientResponse => 2,
            EventCategory::DiscoveryResult => 3,
            EventCategory::HandshakeResult => 4,
            EventCategory::GatewayNotification => 5,
        }
    }

    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            EventCategory::StateChanged => "state-changed",
            EventCategory::ResourceChanged => "resource-changed",
            EventCategory::ClientResponse => "client-response",
            EventCategory::DiscoveryResult => "discovery-result",
            EventCategory::HandshakeResult => "handshake-result",
            EventCategory::GatewayNotification => "gateway-notification",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event delivered to an installed handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A device changed state (e.g. `"discovered"`).
    StateChanged {
        identifier: String,
        address: String,
        event: String,
    },
    /// A resource advertised by a remote device changed.
    ResourceChanged {
        anchor: String,
        uri: String,
        types: Vec<String>,
        interfaces: Vec<String>,
    },
    /// Terminal notification for a request.
    ClientResponse {
        identifier: String,
        status: Status,
        format: &'static str,
        tag: String,
        path: String,
        payload: String,
    },
    /// Raw discovery reply.
    DiscoveryResult { payload: String },
    /// Outcome of a secure handshake.
    HandshakeResult {
        identifier: String,
        status: i32,
        security_identity: Vec<u8>,
        secret: Vec<u8>,
    },
    /// Group message received by the gateway, rendered as JSON.
    GatewayNotification { sender: String, payload_json: String },
}

impl Event {
    /// Category this event is dispatched under.
    pub fn category(&self) -> EventCategory {
        match self {
            Event::StateChanged { .. } => EventCategory::StateChanged,
            Event::ResourceChanged { .. } => EventCategory::ResourceChanged,
            Event::ClientResponse { .. } => EventCategory::ClientResponse,
            Event::DiscoveryResult { .. } => EventCategory::DiscoveryResult,
            Event::HandshakeResult { .. } => EventCategory::HandshakeResult,
            Event::GatewayNotification { .. } => EventCategory::GatewayNotification,
        }
    }
}

/// Receiver of bridge events.
///
/// Implemented for any `Fn(&Event) + Send + Sync`, so closures can be
/// installed directly.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

type Slot = Option<Arc<dyn EventHandler>>;

/// Per-category handler table.
pub struct CallbackTable {
    slots: RwLock<[Slot; 6]>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Default::default()),
        }
    }

    /// Install `handler` for `category`, returning the handler it replaced.
    pub fn install(
        &self,
        category: EventCategory,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        log::debug!("[dispatch] installed {} handler", category);
        self.slots.write()[category.slot()].replace(handler)
    }

    /// Whether a handler is installed for `category`.
    pub fn is_installed(&self, category: EventCategory) -> bool {
        self.slots.read()[category.slot()].is_some()
    }

    /// Deliver `event` to its category's handler, if any.
    ///
    /// Returns `true` if a handler was called.
    pub fn dispatch(&self, event: &Event) -> bool {
        let category = event.category();
        let handler = self.slots.read()[category.slot()].clone();
        match handler {
            Some(h) => {
                h.on_event(event);
                true
            }
            None => {
                log::trace!("[dispatch] no {} handler, event dropped", category);
                false
            }
        }
    }
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let installed: Vec<_> = EventCategory::ALL
            .iter()
            .filter(|c| slots[c.slot()].is_some())
            .map(|c| c.name())
            .collect();
        f.debug_struct("CallbackTable")
            .field("installed", &installed)
            .finish()
    }
}
