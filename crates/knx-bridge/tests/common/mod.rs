// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scriptable in-memory engine shared by the integration tests.

#![allow(dead_code)]

use knx_bridge::{
    ContentFormat, DeviceIdentity, Endpoint, EngineEvent, EngineRequest, EventSink,
    ProtocolEngine, RequestToken, Result, Status,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How the engine answers accepted requests on its next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responder {
    /// Hold requests until the test answers them.
    Silent,
    /// Answer every confirmable request with 2.05 and a CBOR text string
    /// holding the request path.
    EchoPath,
}

#[derive(Debug)]
pub struct EngineState {
    pub sink: Option<EventSink>,
    pub identity: Option<DeviceIdentity>,
    pub outbox: Vec<EngineRequest>,
    pub sent: Vec<EngineRequest>,
    pub discoveries: Vec<(String, u8, RequestToken)>,
    pub inits: usize,
    pub polls: usize,
    pub shutdowns: usize,
    /// Time spent inside `init`, to widen start-up races.
    pub init_delay: Duration,
    pub next_deadline: Option<Instant>,
    pub reject: bool,
    pub responder: Responder,
    /// Thread currently inside an engine call, for reentrancy checks.
    pub inside: Option<thread::ThreadId>,
    pub reentered: bool,
}

#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    pub state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    pub fn new(responder: Responder) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                sink: None,
                identity: None,
                outbox: Vec::new(),
                sent: Vec::new(),
                discoveries: Vec::new(),
                inits: 0,
                polls: 0,
                shutdowns: 0,
                init_delay: Duration::ZERO,
                next_deadline: None,
                reject: false,
                responder,
                inside: None,
                reentered: false,
            })),
        }
    }

    /// Push an event as if the network delivered it.
    pub fn deliver(&self, event: EngineEvent) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.map_or(false, |s| s.push(event))
    }

    pub fn discovery_reply(&self, token: RequestToken, body: &str, from: &str) -> bool {
        self.deliver(EngineEvent::DiscoveryReply {
            token,
            payload: body.as_bytes().to_vec(),
            source: Endpoint::new(from),
        })
    }

    fn enter(&self) {
        let mut state = self.state.lock();
        if state.inside.is_some() {
            state.reentered = true;
        }
        state.inside = Some(thread::current().id());
    }

    fn leave(&self) {
        self.state.lock().inside = None;
    }
}

/// CBOR encoding of a text string.
pub fn cbor_text(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(&ciborium::value::Value::Text(s.to_string()), &mut out)
        .expect("encode cbor text");
    out
}

impl ProtocolEngine for ScriptedEngine {
    fn init(&mut self, identity: &DeviceIdentity, events: EventSink) -> Result<()> {
        let delay = self.state.lock().init_delay;
        thread::sleep(delay);
        let mut state = self.state.lock();
        state.inits += 1;
        state.identity = Some(identity.clone());
        state.sink = Some(events);
        Ok(())
    }

    fn poll(&mut self) -> Option<Instant> {
        self.enter();
        // Widen the critical section so overlapping calls would be caught.
        thread::sleep(Duration::from_micros(200));

        let (outbox, sink, responder, deadline) = {
            let mut state = self.state.lock();
            state.polls += 1;
            let outbox = std::mem::take(&mut state.outbox);
            state.sent.extend(outbox.iter().cloned());
            (outbox, state.sink.clone(), state.responder, state.next_deadline)
        };

        if responder == Responder::EchoPath {
            if let Some(sink) = sink {
                for req in outbox.into_iter().filter(|r| r.confirmable) {
                    if let Some(token) = req.token {
                        sink.push(EngineEvent::Response {
                            token,
                            status: Status::Ok,
                            content_format: ContentFormat::Cbor,
                            payload: cbor_text(&req.path),
                            source: Some(req.endpoint.clone()),
                        });
                    }
                }
            }
        }

        self.leave();
        deadline
    }

    fn submit(&mut self, request: EngineRequest) -> bool {
        self.enter();
        let accepted = {
            let mut state = self.state.lock();
            if state.reject {
                false
            } else {
                state.outbox.push(request);
                true
            }
        };
        self.leave();
        accepted
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
        _endpoint: &Endpoint,
        _password: &str,
        _identity_hint: &[u8],
        _token: RequestToken,
    ) -> bool {
        !self.state.lock().reject
    }

    fn shutdown(&mut self) {
        let mut state = self.state.lock();
        state.shutdowns += 1;
        state.sink = None;
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
