// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge context object.
//!
//! [`Bridge`] owns one protocol engine together with the device registry,
//! request correlator, callback table and event loop that serve it. Several
//! independent bridges can coexist in one process.
//!
//! # Thread Safety
//!
//! `Bridge` is `Send + Sync`; share it with `Arc<Bridge>`. Every engine call
//! happens under the engine lock, held only for the duration of that call.
//! Engine events are queued and handled after the lock is released, so event
//! handlers may call back into the bridge.
//!
//! # Example
//!
//! ```ignore
//! let bridge = Bridge::new(MyEngine::new(), BridgeConfig::default())?;
//! bridge.install(EventCategory::ClientResponse, |e: &Event| println!("{:?}", e));
//! bridge.start(None)?;
//! bridge.discover_default()?;
//! // ...
//! bridge.stop();
//! ```

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{BridgeConfig, ConfigError, DeviceIdentity, DiscoveryMode, Threading};
use crate::correlator::{Correlator, Pending, RequestContext, RequestToken};
use crate::discovery::DiscoveryContext;
use crate::dispatch::{CallbackTable, Event, EventCategory, EventHandler};
use crate::endpoint::Endpoint;
use crate::engine::{self, EngineEvent, EngineRequest, EventSink, Method, ProtocolEngine};
use crate::error::{BridgeError, Result};
use crate::event_loop::{EventLoop, LoopState, PollCycle, WakeSignal};
use crate::payload::{self, ContentFormat, PayloadFormat, ServiceType, SModeValue};
use crate::registry::{DeviceHandle, DeviceRegistry};
use crate::request::Request;
use crate::status::Status;

/// Path group (s-mode) messages are posted to.
pub const S_MODE_PATH: &str = "/.knx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnginePhase {
    Idle,
    Live,
    Released,
}

struct EngineSlot {
    engine: Box<dyn ProtocolEngine>,
    phase: EnginePhase,
}

struct Shared {
    config: BridgeConfig,
    engine: Mutex<EngineSlot>,
    events: Receiver<EngineEvent>,
    sink: EventSink,
    registry: DeviceRegistry,
    correlator: Correlator,
    callbacks: CallbackTable,
    event_loop: EventLoop,
    max_payload: AtomicUsize,
}

impl Shared {
    /// Run `f` on the engine under the engine lock.
    fn with_engine<R>(&self, f: impl FnOnce(&mut dyn ProtocolEngine) -> R) -> Result<R> {
        let mut slot = self.engine.lock();
        match slot.phase {
            EnginePhase::Live => Ok(f(slot.engine.as_mut())),
            EnginePhase::Idle => Err(BridgeError::NotRunning),
            EnginePhase::Released => Err(BridgeError::ShutDown),
        }
    }

    fn drain_events(&self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Response {
                token,
                status,
                content_format,
                payload,
                source,
            } => {
                if !self
                    .correlator
                    .complete(token, status, content_format, &payload, &self.callbacks)
                {
                    log::trace!(
                        "[bridge] stray response {} from {}",
                        status,
                        source.map(|s| s.address).unwrap_or_default()
                    );
                }
            }
            EngineEvent::DiscoveryReply {
                token,
                payload,
                source,
            } => {
                DiscoveryContext {
                    registry: &self.registry,
                    correlator: &self.correlator,
                    callbacks: &self.callbacks,
                    secure_by_default: self.config.secure_by_default,
                }
                .handle_reply(token, &payload, &source);
            }
            EngineEvent::HandshakeResult {
                token,
                status,
                security_identity,
                secret,
            } => match self.correlator.take_handshake(token) {
                Some(identifier) => {
                    log::debug!("[bridge] handshake with {} finished: {}", identifier, status);
                    self.callbacks.dispatch(&Event::HandshakeResult {
                        identifier,
                        status,
                        security_identity,
                        secret,
                    });
                }
                None => log::debug!("[bridge] handshake result for unknown token {}", token),
            },
            EngineEvent::GatewayNotification { sender, payload } => {
                let payload_json = payload::cbor_to_json_text(&payload).unwrap_or_default();
                self.callbacks.dispatch(&Event::GatewayNotification {
                    sender,
                    payload_json,
                });
            }
            EngineEvent::ResourceChanged {
                anchor,
                uri,
                types,
                interfaces,
            } => {
                self.callbacks.dispatch(&Event::ResourceChanged {
                    anchor,
                    uri,
                    types,
                    interfaces,
                });
            }
        }
    }
}

impl PollCycle for Shared {
    fn poll_cycle(&self) -> Option<Instant> {
        let next = {
            let mut slot = self.engine.lock();
            if slot.phase != EnginePhase::Live {
                return None;
            }
            slot.engine.poll()
        };
        self.drain_events();
        next
    }
}

/// Asynchronous bridge between callers and a protocol engine.
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    /// Create a bridge around `engine`. The engine is not touched until
    /// [`start`](Self::start).
    pub fn new<E: ProtocolEngine + 'static>(engine: E, config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let wake = Arc::new(WakeSignal::new());
        let (sink, events) = engine::event_queue(Arc::clone(&wake));

        let shared = Shared {
            engine: Mutex::new(EngineSlot {
                engine: Box::new(engine),
                phase: EnginePhase::Idle,
            }),
            events,
            sink,
            registry: DeviceRegistry::new(config.max_devices),
            correlator: Correlator::new(config.max_pending_requests),
            callbacks: CallbackTable::new(),
            event_loop: EventLoop::new(wake),
            max_payload: AtomicUsize::new(config.max_payload_size),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Event-loop state.
    pub fn state(&self) -> LoopState {
        self.shared.event_loop.state()
    }

    /// Producer handle for engine events, for engines that deliver events
    /// from their own threads.
    pub fn event_sink(&self) -> EventSink {
        self.shared.sink.clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialise the engine and start the event loop.
    ///
    /// Uses the configured identity when `identity` is `None`.
    pub fn start(&self, identity: Option<DeviceIdentity>) -> Result<()> {
        if self.shared.event_loop.is_shut_down() {
            return Err(BridgeError::ShutDown);
        }
        let identity = identity.unwrap_or_else(|| self.shared.config.identity.clone());

        {
            let mut slot = self.shared.engine.lock();
            match slot.phase {
                EnginePhase::Live => return Err(BridgeError::AlreadyRunning),
                EnginePhase::Released => return Err(BridgeError::ShutDown),
                EnginePhase::Idle => {}
            }
            slot.engine.init(&identity, self.shared.sink.clone())?;
            slot.engine.set_max_payload_size(self.max_payload_size());
            slot.phase = EnginePhase::Live;
        }

        if let Err(e) = self
            .shared
            .event_loop
            .start(Arc::clone(&self.shared), self.shared.config.threading)
        {
            log::error!("[bridge] event loop failed to start: {}", e);
            let mut slot = self.shared.engine.lock();
            // A concurrent stop() may already have released the engine.
            if slot.phase == EnginePhase::Live {
                slot.engine.shutdown();
            }
            slot.phase = EnginePhase::Released;
            return Err(e);
        }

        log::info!(
            "[bridge] started as {} {} (sn {})",
            identity.manufacturer,
            identity.name,
            identity.serial_number
        );
        Ok(())
    }

    /// Run one poll cycle on the calling thread without blocking.
    ///
    /// Returns the engine's next timer deadline. Only valid in cooperative
    /// mode: with a worker, events must be handled on the worker thread alone.
    ///
    /// # Errors
    ///
    /// [`BridgeError::WorkerDriven`] in [`Threading::Worker`] mode,
    /// `NotRunning` before `start()`, `ShutDown` after `stop()`.
    pub fn poll(&self) -> Result<Option<Instant>> {
        if !self.shared.event_loop.is_running() {
            return Err(if self.shared.event_loop.is_shut_down() {
                BridgeError::ShutDown
            } else {
                BridgeError::NotRunning
            });
        }
        if self.shared.config.threading == Threading::Worker {
            return Err(BridgeError::WorkerDriven);
        }
        Ok(self.shared.poll_cycle())
    }

    /// Wake the worker so it polls the engine promptly.
    pub fn signal(&self) {
        self.shared.event_loop.signal();
    }

    /// Stop the event loop, release the engine, abandon pending requests and
    /// clear the registry. Idempotent.
    pub fn stop(&self) {
        if !self.shared.event_loop.stop() {
            return;
        }

        {
            let mut slot = self.shared.engine.lock();
            if slot.phase == EnginePhase::Live {
                slot.engine.shutdown();
            }
            slot.phase = EnginePhase::Released;
        }

        let abandoned = self.shared.correlator.abandon_all();
        let discarded = self.shared.events.try_iter().count();
        self.shared.registry.clear();
        log::info!(
            "[bridge] stopped ({} pending requests abandoned, {} queued events discarded)",
            abandoned,
            discarded
        );
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Install the handler for `category`, returning the one it replaces.
    pub fn install<H: EventHandler + 'static>(
        &self,
        category: EventCategory,
        handler: H,
    ) -> Option<Arc<dyn EventHandler>> {
        self.shared.callbacks.install(category, Arc::new(handler))
    }

    /// Install an already shared handler.
    pub fn install_shared(
        &self,
        category: EventCategory,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        self.shared.callbacks.install(category, handler)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Submit a request to a registered device.
    ///
    /// The returned token identifies the single client-response that will
    /// follow.
    ///
    /// # Errors
    ///
    /// `PayloadTooLarge`, `UnknownDevice`, `TooManyPending`,
    /// `SubmissionRejected`, or a lifecycle error. No client-response follows
    /// an error unless `synthesize_rejections` is set.
    pub fn submit(&self, request: Request) -> Result<RequestToken> {
        let Request {
            method,
            identifier,
            path,
            query,
            payload,
            content_format,
            accept,
            tag,
            secure,
        } = request;

        let max = self.max_payload_size();
        if payload.len() > max {
            log::warn!(
                "[bridge] {} {} {}: payload {} bytes exceeds {}",
                method,
                identifier,
                path,
                payload.len(),
                max
            );
            return Err(BridgeError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let Some(device) = self.shared.registry.find(&identifier) else {
            log::warn!("[bridge] {} {}: unknown device {}", method, path, identifier);
            self.synthesize_rejection(&identifier, &path, &tag, Status::UnknownDevice);
            return Err(BridgeError::UnknownDevice(identifier));
        };

        let mut endpoint = device.endpoint;
        if let Some(secure) = secure {
            endpoint.set_secure(secure);
        }

        let token = self.shared.correlator.begin(Pending::Request(RequestContext {
            identifier: identifier.clone(),
            path: path.clone(),
            tag: tag.clone(),
        }))?;

        let engine_request = EngineRequest {
            method,
            endpoint,
            path: path.clone(),
            query,
            payload,
            content_format,
            accept,
            confirmable: true,
            token: Some(token),
        };

        match self.shared.with_engine(|e| e.submit(engine_request)) {
            Ok(true) => {}
            Ok(false) => {
                self.shared.correlator.discard(token);
                log::warn!("[bridge] engine rejected {} {} {}", method, identifier, path);
                self.synthesize_rejection(&identifier, &path, &tag, Status::SubmissionFailed);
                return Err(BridgeError::SubmissionRejected(method.as_str()));
            }
            Err(e) => {
                self.shared.correlator.discard(token);
                return Err(e);
            }
        }

        log::debug!("[bridge] {} {} {} submitted as {}", method, identifier, path, token);
        self.signal();
        Ok(token)
    }

    /// GET with a structured (CBOR) response.
    pub fn get(&self, identifier: &str, path: &str, query: Option<&str>, tag: &str) -> Result<RequestToken> {
        self.submit(Request::get(identifier, path).query(query.unwrap_or_default()).tag(tag))
    }

    /// GET with a link-format response.
    pub fn get_link_format(
        &self,
        identifier: &str,
        path: &str,
        query: Option<&str>,
        tag: &str,
    ) -> Result<RequestToken> {
        self.submit(
            Request::get_link_format(identifier, path)
                .query(query.unwrap_or_default())
                .tag(tag),
        )
    }

    /// POST a pre-encoded CBOR body.
    pub fn post(
        &self,
        identifier: &str,
        path: &str,
        query: Option<&str>,
        payload: &[u8],
        tag: &str,
    ) -> Result<RequestToken> {
        self.submit(
            Request::post(identifier, path, payload.to_vec())
                .query(query.unwrap_or_default())
                .tag(tag),
        )
    }

    /// PUT a pre-encoded CBOR body.
    pub fn put(
        &self,
        identifier: &str,
        path: &str,
        query: Option<&str>,
        payload: &[u8],
        tag: &str,
    ) -> Result<RequestToken> {
        self.submit(
            Request::put(identifier, path, payload.to_vec())
                .query(query.unwrap_or_default())
                .tag(tag),
        )
    }

    pub fn delete(&self, identifier: &str, path: &str, query: Option<&str>, tag: &str) -> Result<RequestToken> {
        self.submit(Request::delete(identifier, path).query(query.unwrap_or_default()).tag(tag))
    }

    fn synthesize_rejection(&self, identifier: &str, path: &str, tag: &str, status: Status) {
        if !self.shared.config.synthesize_rejections {
            return;
        }
        self.shared.callbacks.dispatch(&Event::ClientResponse {
            identifier: identifier.to_string(),
            status,
            format: PayloadFormat::Error.name(),
            tag: tag.to_string(),
            path: path.to_string(),
            payload: String::new(),
        });
    }

    // ========================================================================
    // Discovery, handshake, group messages
    // ========================================================================

    /// Send a multicast discovery query.
    ///
    /// Replies register devices and are delivered as state-changed and
    /// discovery-result events.
    pub fn discover(&self, scope: u8, query: &str) -> Result<RequestToken> {
        let continuous = self.shared.config.discovery_mode == DiscoveryMode::Continuous;
        let token = self
            .shared
            .correlator
            .begin(Pending::Discovery { continuous })?;

        match self.shared.with_engine(|e| e.discover(query, scope, token)) {
            Ok(true) => {}
            Ok(false) => {
                self.shared.correlator.discard(token);
                log::warn!("[bridge] engine rejected discovery '{}' (scope {})", query, scope);
                return Err(BridgeError::SubmissionRejected("discovery"));
            }
            Err(e) => {
                self.shared.correlator.discard(token);
                return Err(e);
            }
        }

        log::debug!("[bridge] discovery '{}' scope {} as {}", query, scope, token);
        self.signal();
        Ok(token)
    }

    /// Discovery with the configured query and scope.
    pub fn discover_default(&self) -> Result<RequestToken> {
        let config = &self.shared.config;
        self.discover(config.discovery_scope, &config.discovery_query)
    }

    /// Start a password-based secure handshake with a registered device.
    ///
    /// If the engine refuses immediately, the handshake-result handler is
    /// called with status -1 and an empty secret before the error returns.
    pub fn initiate_secure_handshake(&self, identifier: &str, password: &str) -> Result<RequestToken> {
        let device = self
            .shared
            .registry
            .modify(identifier, |d| {
                if d.endpoint.serial_number.is_none() {
                    d.endpoint.serial_number = Some(identifier.to_string());
                }
            })
            .ok_or_else(|| BridgeError::UnknownDevice(identifier.to_string()))?;

        let token = self.shared.correlator.begin(Pending::Handshake {
            identifier: identifier.to_string(),
        })?;

        let accepted = self.shared.with_engine(|e| {
            e.initiate_secure_handshake(&device.endpoint, password, identifier.as_bytes(), token)
        });
        match accepted {
            Ok(true) => {}
            Ok(false) => {
                self.shared.correlator.discard(token);
                log::warn!("[bridge] engine rejected handshake with {}", identifier);
                self.shared.callbacks.dispatch(&Event::HandshakeResult {
                    identifier: identifier.to_string(),
                    status: -1,
                    security_identity: Vec::new(),
                    secret: Vec::new(),
                });
                return Err(BridgeError::SubmissionRejected("handshake"));
            }
            Err(e) => {
                self.shared.correlator.discard(token);
                return Err(e);
            }
        }

        log::debug!("[bridge] handshake with {} started as {}", identifier, token);
        self.signal();
        Ok(token)
    }

    /// Send an unconfirmed group (s-mode) message to all KNX nodes in `scope`.
    ///
    /// Fire-and-forget: no token and no client-response.
    pub fn issue_s_mode(
        &self,
        scope: u8,
        sia: u32,
        group_address: u32,
        service: ServiceType,
        value: SModeValue,
    ) -> Result<()> {
        let payload = payload::encode_s_mode(sia, group_address, service, value)?;
        let max = self.max_payload_size();
        if payload.len() > max {
            return Err(BridgeError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let request = EngineRequest {
            method: Method::Post,
            endpoint: Endpoint::all_knx_nodes(scope),
            path: S_MODE_PATH.to_string(),
            query: None,
            payload,
            content_format: Some(ContentFormat::Cbor),
            accept: None,
            confirmable: false,
            token: None,
        };
        if !self.shared.with_engine(|e| e.submit(request))? {
            log::warn!("[bridge] engine rejected s-mode message to ga {}", group_address);
            return Err(BridgeError::SubmissionRejected("s-mode"));
        }

        log::debug!(
            "[bridge] s-mode {} ga={} sia={} scope={}",
            service.code(),
            group_address,
            sia,
            scope
        );
        self.signal();
        Ok(())
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Register a device explicitly at `address`.
    pub fn register_device(&self, identifier: &str, address: &str) -> Result<DeviceHandle> {
        let mut endpoint = Endpoint::new(address);
        endpoint.serial_number = Some(identifier.to_string());
        self.shared
            .registry
            .upsert(identifier, Some(address), Some(endpoint), None)
    }

    /// Set the display name of a registered device.
    pub fn set_device_name(&self, identifier: &str, name: &str) -> Result<()> {
        if self.shared.registry.find(identifier).is_none() {
            return Err(BridgeError::UnknownDevice(identifier.to_string()));
        }
        self.shared.registry.upsert(identifier, None, None, Some(name))?;
        Ok(())
    }

    /// Enable or disable OSCORE for requests to a device.
    pub fn set_device_secure(&self, identifier: &str, secure: bool) -> Result<()> {
        self.shared
            .registry
            .set_secure(identifier, secure)
            .map(|_| ())
            .ok_or_else(|| BridgeError::UnknownDevice(identifier.to_string()))
    }

    pub fn device_count(&self) -> usize {
        self.shared.registry.count()
    }

    /// Identifier of the device at `index` in enumeration order.
    pub fn device_identifier(&self, index: usize) -> Option<String> {
        self.shared
            .registry
            .get_by_index(index)
            .map(|d| d.identifier().to_string())
    }

    pub fn device(&self, identifier: &str) -> Option<DeviceHandle> {
        self.shared.registry.find(identifier)
    }

    pub fn device_identifiers(&self) -> Vec<String> {
        self.shared.registry.identifiers()
    }

    pub fn clear_devices(&self) {
        self.shared.registry.clear();
    }

    // ========================================================================
    // Limits
    // ========================================================================

    /// Set the maximum request payload size. Forwarded to a running engine.
    pub fn set_max_payload_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(ConfigError::Invalid("max_payload_size must be > 0".into()).into());
        }
        self.shared.max_payload.store(size, Ordering::Release);
        // Not running yet: applied at start().
        let _ = self.shared.with_engine(|e| e.set_max_payload_size(size));
        Ok(())
    }

    pub fn max_payload_size(&self) -> usize {
        self.shared.max_payload.load(Ordering::Acquire)
    }

    /// Requests, discoveries and handshakes still awaiting an outcome.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("devices", &self.device_count())
            .field("pending", &self.pending_requests())
            .field("callbacks", &self.shared.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Threading;
    use crate::engine::mock::MockEngine;

    fn cooperative() -> BridgeConfig {
        BridgeConfig {
            threading: Threading::Cooperative,
            ..BridgeConfig::default()
        }
    }

    fn recorder(bridge: &Bridge, category: EventCategory) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bridge.install(category, move |e: &Event| sink.lock().push(e.clone()));
        seen
    }

    fn started(config: BridgeConfig) -> (Bridge, MockEngine) {
        let engine = MockEngine::new();
        let bridge = Bridge::new(engine.clone(), config).unwrap();
        bridge.start(None).unwrap();
        (bridge, engine)
    }

    #[test]
    fn test_requests_before_start_fail() {
        let bridge = Bridge::new(MockEngine::new(), cooperative()).unwrap();
        bridge.register_device("A001", "fe80::1").unwrap();
        assert!(matches!(
            bridge.get("A001", "/p/1", None, "t"),
            Err(BridgeError::NotRunning)
        ));
        assert_eq!(bridge.pending_requests(), 0);
        assert!(matches!(bridge.poll(), Err(BridgeError::NotRunning)));
    }

    #[test]
    fn test_get_round_trip() {
        let (bridge, engine) = started(cooperative());
        let responses = recorder(&bridge, EventCategory::ClientResponse);
        bridge.register_device("A001", "fe80::1").unwrap();

        let token = bridge.get("A001", "/p/1", Some("x=1"), "tag-1").unwrap();
        {
            let state = engine.state.lock();
            let req = &state.requests[0];
            assert_eq!(req.method, Method::Get);
            assert_eq!(req.path, "/p/1");
            assert_eq!(req.query.as_deref(), Some("x=1"));
            assert_eq!(req.token, Some(token));
            assert_eq!(req.accept, Some(ContentFormat::Cbor));
        }

        engine.push(EngineEvent::Response {
            token,
            status: Status::Ok,
            content_format: ContentFormat::Cbor,
            payload: vec![0xf5],
            source: None,
        });
        bridge.poll().unwrap();

        let responses = responses.lock();
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses[0],
            Event::ClientResponse {
                identifier: "A001".into(),
                status: Status::Ok,
                format: "json",
                tag: "tag-1".into(),
                path: "/p/1".into(),
                payload: "true".into(),
            }
        );
        assert_eq!(bridge.pending_requests(), 0);
    }

    #[test]
    fn test_unknown_device_fails_fast() {
        let (bridge, engine) = started(cooperative());
        let responses = recorder(&bridge, EventCategory::ClientResponse);
        let err = bridge.get("nope", "/p/1", None, "t").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownDevice(ref id) if id == "nope"));
        assert!(engine.state.lock().requests.is_empty());
        assert!(responses.lock().is_empty());
    }

    #[test]
    fn test_synthesized_rejections() {
        let config = BridgeConfig {
            synthesize_rejections: true,
            ..cooperative()
        };
        let (bridge, engine) = started(config);
        let responses = recorder(&bridge, EventCategory::ClientResponse);

        assert!(bridge.get("nope", "/p/1", None, "t1").is_err());
        bridge.register_device("A001", "fe80::1").unwrap();
        engine.state.lock().reject = true;
        assert!(matches!(
            bridge.delete("A001", "/p/1", None, "t2"),
            Err(BridgeError::SubmissionRejected("DELETE"))
        ));

        let responses = responses.lock();
        let statuses: Vec<_> = responses
            .iter()
            .map(|e| match e {
                Event::ClientResponse { status, format, .. } => (*status, *format),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![(Status::UnknownDevice, "error"), (Status::SubmissionFailed, "error")]
        );
        assert_eq!(bridge.pending_requests(), 0);
    }

    #[test]
    fn test_payload_limit() {
        let (bridge, engine) = started(cooperative());
        bridge.register_device("A001", "fe80::1").unwrap();
        bridge.set_max_payload_size(4).unwrap();
        assert_eq!(engine.state.lock().max_payload, Some(4));

        assert!(matches!(
            bridge.put("A001", "/p/1", None, &[0u8; 5], "t"),
            Err(BridgeError::PayloadTooLarge { size: 5, max: 4 })
        ));
        assert!(bridge.put("A001", "/p/1", None, &[0u8; 4], "t").is_ok());
        assert!(bridge.set_max_payload_size(0).is_err());
        assert_eq!(bridge.max_payload_size(), 4);
    }

    #[test]
    fn test_secure_override_per_request() {
        let (bridge, engine) = started(cooperative());
        bridge.register_device("A001", "fe80::1").unwrap();
        bridge.set_device_secure("A001", true).unwrap();

        bridge.submit(Request::get("A001", "/a")).unwrap();
        bridge.submit(Request::get("A001", "/b").secure(false)).unwrap();

        let state = engine.state.lock();
        assert!(state.requests[0].endpoint.is_secure());
        assert!(!state.requests[1].endpoint.is_secure());
        // The override does not stick to the device.
        assert!(bridge.device("A001").unwrap().endpoint.is_secure());
    }

    #[test]
    fn test_discovery_populates_registry() {
        let (bridge, engine) = started(cooperative());
        let changes = recorder(&bridge, EventCategory::StateChanged);
        let raw = recorder(&bridge, EventCategory::DiscoveryResult);

        let token = bridge.discover_default().unwrap();
        assert_eq!(
            engine.state.lock().discoveries[0],
            ("rt=urn:knx:dpa.*".to_string(), 2, token)
        );

        engine.push(EngineEvent::DiscoveryReply {
            token,
            payload: b"<>;ep=urn:knx:sn.00fa10010701".to_vec(),
            source: Endpoint::new("fe80::1"),
        });
        bridge.poll().unwrap();

        assert_eq!(bridge.device_count(), 1);
        assert_eq!(bridge.device_identifier(0).as_deref(), Some("00fa10010701"));
        assert_eq!(changes.lock().len(), 1);
        assert_eq!(raw.lock().len(), 1);
        assert_eq!(bridge.pending_requests(), 0);
    }

    #[test]
    fn test_handshake_rejection_notifies() {
        let (bridge, engine) = started(cooperative());
        let results = recorder(&bridge, EventCategory::HandshakeResult);
        bridge.register_device("A001", "fe80::1").unwrap();
        engine.state.lock().reject = true;

        assert!(bridge.initiate_secure_handshake("A001", "pw").is_err());
        assert_eq!(
            results.lock()[0],
            Event::HandshakeResult {
                identifier: "A001".into(),
                status: -1,
                security_identity: vec![],
                secret: vec![],
            }
        );
    }

    #[test]
    fn test_handshake_result_correlated() {
        let (bridge, engine) = started(cooperative());
        let results = recorder(&bridge, EventCategory::HandshakeResult);
        bridge.register_device("A001", "fe80::1").unwrap();

        let token = bridge.initiate_secure_handshake("A001", "LETTUCE").unwrap();
        let (endpoint, password, _) = engine.state.lock().handshakes[0].clone();
        assert_eq!(endpoint.serial_number.as_deref(), Some("A001"));
        assert_eq!(password, "LETTUCE");

        engine.push(EngineEvent::HandshakeResult {
            token,
            status: 0,
            security_identity: b"id".to_vec(),
            secret: vec![1, 2, 3],
        });
        bridge.poll().unwrap();
        match &results.lock()[0] {
            Event::HandshakeResult { identifier, status, secret, .. } => {
                assert_eq!(identifier, "A001");
                assert_eq!(*status, 0);
                assert_eq!(secret, &vec![1, 2, 3]);
            }
            other => panic!("unexpected {:?}", other),
        };
    }

    #[test]
    fn test_s_mode_is_fire_and_forget() {
        let (bridge, engine) = started(cooperative());
        bridge
            .issue_s_mode(5, 1, 1025, ServiceType::Write, SModeValue::Int(7))
            .unwrap();
        let state = engine.state.lock();
        let req = &state.requests[0];
        assert_eq!(req.path, "/.knx");
        assert_eq!(req.endpoint.address, "coap://[ff05::fd]:5683");
        assert!(!req.confirmable);
        assert!(req.token.is_none());
        assert_eq!(bridge.pending_requests(), 0);
    }

    #[test]
    fn test_gateway_notification_rendered_as_json() {
        let (bridge, engine) = started(cooperative());
        let seen = recorder(&bridge, EventCategory::GatewayNotification);
        let body = payload::encode_s_mode(1, 2, ServiceType::Write, SModeValue::Bool(false)).unwrap();
        engine.push(EngineEvent::GatewayNotification {
            sender: "fe80::7".into(),
            payload: body,
        });
        bridge.poll().unwrap();
        match &seen.lock()[0] {
            Event::GatewayNotification { sender, payload_json } => {
                assert_eq!(sender, "fe80::7");
                assert!(payload_json.contains("\"6\":\"w\""));
            }
            other => panic!("unexpected {:?}", other),
        };
    }

    #[test]
    fn test_stop_releases_everything_once() {
        let (bridge, engine) = started(cooperative());
        bridge.register_device("A001", "fe80::1").unwrap();
        bridge.get("A001", "/p/1", None, "t").unwrap();

        bridge.stop();
        bridge.stop();
        bridge.signal();

        assert_eq!(engine.state.lock().shutdowns, 1);
        assert_eq!(bridge.device_count(), 0);
        assert_eq!(bridge.pending_requests(), 0);
        assert!(matches!(bridge.start(None), Err(BridgeError::ShutDown)));
        assert!(matches!(bridge.poll(), Err(BridgeError::ShutDown)));
        assert!(matches!(
            bridge.discover_default(),
            Err(BridgeError::ShutDown)
        ));
    }

    #[test]
    fn test_poll_rejected_in_worker_mode() {
        let (bridge, _engine) = started(BridgeConfig::default());
        assert!(matches!(bridge.poll(), Err(BridgeError::WorkerDriven)));
        bridge.stop();
        assert!(matches!(bridge.poll(), Err(BridgeError::ShutDown)));
    }

    #[test]
    fn test_set_device_name_and_secure_unknown() {
        let (bridge, _engine) = started(cooperative());
        assert!(bridge.set_device_name("x", "n").is_err());
        assert!(bridge.set_device_secure("x", true).is_err());
        bridge.register_device("A001", "fe80::1").unwrap();
        bridge.set_device_name("A001", "kitchen").unwrap();
        assert_eq!(bridge.device("A001").unwrap().name, "kitchen");
    }
}
