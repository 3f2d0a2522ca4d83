// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Boundary with the protocol engine.
//!
//! The engine is single-threaded and not reentrant. The bridge owns it behind
//! a single mutex (the engine lock) and is the only caller of
//! [`ProtocolEngine`] methods, so implementations need `Send` but not `Sync`.
//!
//! Engine-originated events do not call back into the bridge directly.
//! Instead the engine pushes [`EngineEvent`]s into the [`EventSink`] it was
//! given at [`init`](ProtocolEngine::init). The bridge drains the sink after
//! releasing the engine lock, so handlers are free to issue new requests.

use crossbeam::channel::{Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::DeviceIdentity;
use crate::correlator::RequestToken;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::event_loop::WakeSignal;
use crate::payload::ContentFormat;
use crate::status::Status;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub method: Method,
    /// Target endpoint; its secure flag selects OSCORE protection.
    pub endpoint: Endpoint,
    pub path: String,
    pub query: Option<String>,
    pub payload: Vec<u8>,
    /// Content format of `payload`, if any.
    pub content_format: Option<ContentFormat>,
    /// Preferred response format.
    pub accept: Option<ContentFormat>,
    /// Confirmable (retransmitted) or fire-and-forget.
    pub confirmable: bool,
    /// Correlation token. `None` for messages that expect no response.
    pub token: Option<RequestToken>,
}

/// Event reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Response to a submitted request.
    Response {
        token: RequestToken,
        status: Status,
        content_format: ContentFormat,
        payload: Vec<u8>,
        source: Option<Endpoint>,
    },
    /// One reply to a discovery query.
    DiscoveryReply {
        token: RequestToken,
        payload: Vec<u8>,
        source: Endpoint,
    },
    /// Outcome of a secure handshake.
    HandshakeResult {
        token: RequestToken,
        status: i32,
        security_identity: Vec<u8>,
        secret: Vec<u8>,
    },
    /// Group message received while acting as gateway. `payload` is CBOR.
    GatewayNotification { sender: String, payload: Vec<u8> },
    /// A remote resource changed.
    ResourceChanged {
        anchor: String,
        uri: String,
        types: Vec<String>,
        interfaces: Vec<String>,
    },
}

/// The protocol engine as seen by the bridge.
///
/// Boolean returns mean "accepted for sending"; `false` is a synchronous
/// rejection and no event will follow for that token.
pub trait ProtocolEngine: Send {
    /// Initialise with the local identity. `events` stays valid until
    /// [`shutdown`](Self::shutdown).
    fn init(&mut self, identity: &DeviceIdentity, events: EventSink) -> Result<()>;

    /// Advance protocol state. Returns the next timer deadline, if any.
    fn poll(&mut self) -> Option<Instant>;

    /// Enqueue a unicast or multicast request.
    fn submit(&mut self, request: EngineRequest) -> bool;

    /// Enqueue a multicast discovery query.
    fn discover(&mut self, query: &str, scope: u8, token: RequestToken) -> bool;

    /// Start a password-based secure handshake with `endpoint`.
    fn initiate_secure_handshake(
        &mut self,
        endpoint: &Endpoint,
        password: &str,
        identity_hint: &[u8],
        token: RequestToken,
    ) -> bool;

    /// Maximum application payload the engine should accept.
    fn set_max_payload_size(&mut self, _size: usize) {}

    /// Release engine resources. Called at most once.
    fn shutdown(&mut self);
}

/// Producer side of the engine event queue.
///
/// Cheap to clone; every push wakes the event loop.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<EngineEvent>,
    wake: Arc<WakeSignal>,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<EngineEvent>, wake: Arc<WakeSignal>) -> Self {
        Self { tx, wake }
    }

    /// Queue an event. Returns `false` once the bridge has gone away.
    pub fn push(&self, event: EngineEvent) -> bool {
        if self.tx.send(event).is_err() {
            log::trace!("[engine] event dropped, bridge gone");
            return false;
        }
        self.wake.notify();
        true
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// Create the event queue shared by an engine and the bridge.
pub(crate) fn event_queue(wake: Arc<WakeSignal>) -> (EventSink, Receiver<EngineEvent>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    (EventSink::new(tx, wake), rx)
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-crate engine for unit tests.

    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    pub struct MockState {
        pub sink: Option<EventSink>,
        pub requests: Vec<EngineRequest>,
        pub discoveries: Vec<(String, u8, RequestToken)>,
        pub handshakes: Vec<(Endpoint, String, RequestToken)>,
        pub polls: usize,
        pub shutdowns: usize,
        pub next_deadline: Option<Instant>,
        pub reject: bool,
        pub max_payload: Option<usize>,
    }

    /// Engine whose state is shared with the test through an `Arc<Mutex<_>>`.
    #[derive(Debug, Clone, Default)]
    pub struct MockEngine {
        pub state: Arc<Mutex<MockState>>,
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, event: EngineEvent) -> bool {
            let sink = self.state.lock().sink.clone();
            sink.map_or(false, |s| s.push(event))
        }
    }

    impl ProtocolEngine for MockEngine {
        fn init(&mut self, _identity: &DeviceIdentity, events: EventSink) -> Result<()> {
            self.state.lock().sink = Some(events);
            Ok(())
        }

        fn poll(&mut self) -> Option<Instant> {
            let mut state = self.state.lock();
            state.polls += 1;
            state.next_deadline
        }

        fn submit(&mut self, request: EngineRequest) -> bool {
            let mut state = self.state.lock();
            if state.reject {
                return false;
            }
            state.requests.push(request);
            true
        }

        fn discover(&mut self, query: &str, scope: u8, token: RequestToken) -> bool {
            let mut state = self.state.lock();
            if state.reject {
                return false;
            }
            state.discoveries.push((query.to_string(), scope, token));
            true
        }

        fn initiate_secure_handshake(
            &mut self,
            endpoint: &Endpoint,
            password: &str,
            _identity_hint: &[u8],
            token: RequestToken,
        ) -> bool {
            let mut state = self.state.lock();
            if state.reject {
                return false;
            }
            state
                .handshakes
                .push((endpoint.clone(), password.to_string(), token));
            true
        }

        fn set_max_payload_size(&mut self, size: usize) {
            self.state.lock().max_payload = Some(size);
        }

        fn shutdown(&mut self) {
            let mut state = self.state.lock();
            state.shutdowns += 1;
            state.sink = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_push_wakes_and_queues() {
        let wake = Arc::new(WakeSignal::new());
        let (sink, rx) = event_queue(Arc::clone(&wake));
        assert!(sink.push(EngineEvent::GatewayNotification {
            sender: "fe80::1".into(),
            payload: vec![],
        }));
        assert!(wake.is_pending());
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_sink_push_after_receiver_dropped() {
        let wake = Arc::new(WakeSignal::new());
        let (sink, rx) = event_queue(wake);
        drop(rx);
        assert!(!sink.push(EngineEvent::GatewayNotification {
            sender: "fe80::1".into(),
            payload: vec![],
        }));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
