// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Foreign protocol engine
//!
//! A C host supplies its CoAP/OSCORE stack as a table of function pointers
//! ([`KnxEngineOps`]). The bridge calls them one at a time under its engine
//! lock. Network events travel back through the `knx_bridge_engine_*`
//! functions, which take the [`KnxEventSink`] handed to `init`.
//!
//! # Usage from C
//!
//! ```c
//! static const KnxEventSink *g_sink;
//!
//! bool my_init(void *ud, const KnxIdentity *id, const KnxEventSink *sink) {
//!     g_sink = sink;
//!     return stack_start(id->serial_number);
//! }
//!
//! KnxEngineOps ops = {0};
//! ops.init = my_init;
//! ops.poll = my_poll;
//! ops.submit = my_submit;
//! ops.user_data = my_stack;
//! KnxBridge *bridge = knx_bridge_create(&ops, NULL);
//! ```

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::time::{Duration, Instant};

use knx_bridge::{
    BridgeError, ContentFormat, DeviceIdentity, Endpoint, EngineEvent, EngineRequest, EventSink,
    Method, ProtocolEngine, RequestToken, Status,
};

use super::bytes_arg;

/// Opaque handle to the bridge's event queue, valid from `init` until
/// `shutdown` returns.
#[repr(C)]
pub struct KnxEventSink {
    _private: [u8; 0],
}

// =============================================================================
// C-compatible views
// =============================================================================

/// Identity of the local client, valid for the duration of `init`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KnxIdentity {
    pub manufacturer: *const c_char,
    pub name: *const c_char,
    pub version: *const c_char,
    pub serial_number: *const c_char,
}

/// CoAP method of an outgoing request.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnxMethod {
    KnxMethodGet = 1,
    KnxMethodPost = 2,
    KnxMethodPut = 3,
    KnxMethodDelete = 4,
}

impl From<Method> for KnxMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => KnxMethod::KnxMethodGet,
            Method::Post => KnxMethod::KnxMethodPost,
            Method::Put => KnxMethod::KnxMethodPut,
            Method::Delete => KnxMethod::KnxMethodDelete,
        }
    }
}

/// Remote endpoint as seen by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KnxEndpoint {
    /// Printable address.
    pub address: *const c_char,
    /// Cookie the engine attached when it reported this endpoint.
    pub transport_handle: u64,
    /// Protect with OSCORE.
    pub secure: bool,
    /// Multicast scope, or -1 for unicast.
    pub multicast_scope: i32,
    /// Serial number for the secure handshake, or NULL.
    pub serial_number: *const c_char,
}

/// Request handed to `submit`. All pointers are valid only during the call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KnxEngineRequest {
    pub method: KnxMethod,
    pub endpoint: KnxEndpoint,
    pub path: *const c_char,
    /// Query string, or NULL.
    pub query: *const c_char,
    pub payload: *const u8,
    pub payload_len: usize,
    /// CoAP content-format number of `payload`, or -1.
    pub content_format: i32,
    /// Preferred response content-format, or -1.
    pub accept: i32,
    pub confirmable: bool,
    /// Correlation token, or 0 when no response is expected.
    pub token: u64,
}

// =============================================================================
// Engine operations table
// =============================================================================

/// Start the engine. Returns false on failure.
pub type KnxEngineInit = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        identity: *const KnxIdentity,
        sink: *const KnxEventSink,
    ) -> bool,
>;

/// Run one engine cycle. Returns milliseconds until the next timer, or a
/// negative value when none is armed.
pub type KnxEnginePoll = Option<unsafe extern "C" fn(user_data: *mut c_void) -> i64>;

/// Queue a request. Returns false if it was refused before sending.
pub type KnxEngineSubmit =
    Option<unsafe extern "C" fn(user_data: *mut c_void, request: *const KnxEngineRequest) -> bool>;

/// Multicast a discovery query.
pub type KnxEngineDiscover = Option<
    unsafe extern "C" fn(user_data: *mut c_void, query: *const c_char, scope: u8, token: u64) -> bool,
>;

/// Begin the password-based handshake with a device.
pub type KnxEngineHandshake = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        endpoint: *const KnxEndpoint,
        password: *const c_char,
        identity_hint: *const u8,
        identity_hint_len: usize,
        token: u64,
    ) -> bool,
>;

pub type KnxEngineSetMaxPayload = Option<unsafe extern "C" fn(user_data: *mut c_void, size: usize)>;

pub type KnxEngineShutdown = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// Host protocol engine.
///
/// `init`, `poll` and `submit` are required. A NULL `discover` or
/// `initiate_secure_handshake` refuses those operations.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KnxEngineOps {
    pub init: KnxEngineInit,
    pub poll: KnxEnginePoll,
    pub submit: KnxEngineSubmit,
    pub discover: KnxEngineDiscover,
    pub initiate_secure_handshake: KnxEngineHandshake,
    pub set_max_payload_size: KnxEngineSetMaxPayload,
    pub shutdown: KnxEngineShutdown,
    /// Passed to every operation.
    pub user_data: *mut c_void,
}

impl KnxEngineOps {
    pub(crate) fn is_complete(&self) -> bool {
        self.init.is_some() && self.poll.is_some() && self.submit.is_some()
    }
}

/// [`ProtocolEngine`] backed by a [`KnxEngineOps`] table.
pub(crate) struct ForeignEngine {
    ops: KnxEngineOps,
    sink: Option<Box<EventSink>>,
}

// Safety: The C caller is responsible for thread safety of user_data and the
// operations. The bridge never calls two operations concurrently.
unsafe impl Send for ForeignEngine {}

impl ForeignEngine {
    pub(crate) fn new(ops: KnxEngineOps) -> Self {
        Self { ops, sink: None }
    }
}

/// Owned C strings behind a [`KnxEndpoint`].
struct EndpointStrings {
    address: CString,
    serial_number: Option<CString>,
}

impl EndpointStrings {
    fn new(endpoint: &Endpoint) -> Option<Self> {
        let serial_number = match &endpoint.serial_number {
            Some(sn) => Some(CString::new(sn.as_str()).ok()?),
            None => None,
        };
        Some(Self {
            address: CString::new(endpoint.address.as_str()).ok()?,
            serial_number,
        })
    }

    fn view(&self, endpoint: &Endpoint) -> KnxEndpoint {
        KnxEndpoint {
            address: self.address.as_ptr(),
            transport_handle: endpoint.transport_handle,
            secure: endpoint.is_secure(),
            multicast_scope: endpoint.multicast_scope.map_or(-1, i32::from),
            serial_number: self
                .serial_number
                .as_ref()
                .map_or(ptr::null(), |s| s.as_ptr()),
        }
    }
}

fn format_number(format: Option<ContentFormat>) -> i32 {
    format.map_or(-1, |f| i32::from(f.number()))
}

impl ProtocolEngine for ForeignEngine {
    fn init(&mut self, identity: &DeviceIdentity, events: EventSink) -> knx_bridge::Result<()> {
        let Some(init) = self.ops.init else {
            return Err(BridgeError::EngineInit("no init operation".into()));
        };
        let strings = [
            &identity.manufacturer,
            &identity.name,
            &identity.version,
            &identity.serial_number,
        ]
        .map(|s| CString::new(s.as_str()));
        let [Ok(manufacturer), Ok(name), Ok(version), Ok(serial_number)] = strings else {
            return Err(BridgeError::EngineInit("identity contains NUL".into()));
        };
        let view = KnxIdentity {
            manufacturer: manufacturer.as_ptr(),
            name: name.as_ptr(),
            version: version.as_ptr(),
            serial_number: serial_number.as_ptr(),
        };

        let sink = Box::new(events);
        let handle = (&*sink as *const EventSink).cast::<KnxEventSink>();
        self.sink = Some(sink);

        // SAFETY: init was supplied by the host; all pointers outlive the call.
        if unsafe { init(self.ops.user_data, &view, handle) } {
            Ok(())
        } else {
            self.sink = None;
            Err(BridgeError::EngineInit("host engine init failed".into()))
        }
    }

    fn poll(&mut self) -> Option<Instant> {
        let poll = self.ops.poll?;
        // SAFETY: poll was supplied by the host.
        let ms = unsafe { poll(self.ops.user_data) };
        u64::try_from(ms)
            .ok()
            .map(|ms| Instant::now() + Duration::from_millis(ms))
    }

    fn submit(&mut self, request: EngineRequest) -> bool {
        let Some(submit) = self.ops.submit else {
            return false;
        };
        let Some(endpoint) = EndpointStrings::new(&request.endpoint) else {
            log::warn!("knx-bridge-c: endpoint {} not representable", request.endpoint);
            return false;
        };
        let Ok(path) = CString::new(request.path.as_str()) else {
            return false;
        };
        let query = match request.query.as_deref().map(CString::new) {
            Some(Ok(q)) => Some(q),
            Some(Err(_)) => return false,
            None => None,
        };

        let view = KnxEngineRequest {
            method: request.method.into(),
            endpoint: endpoint.view(&request.endpoint),
            path: path.as_ptr(),
            query: query.as_ref().map_or(ptr::null(), |q| q.as_ptr()),
            payload: request.payload.as_ptr(),
            payload_len: request.payload.len(),
            content_format: format_number(request.content_format),
            accept: format_number(request.accept),
            confirmable: request.confirmable,
            token: request.token.map_or(0, RequestToken::as_raw),
        };
        // SAFETY: submit was supplied by the host; the view outlives the call.
        unsafe { submit(self.ops.user_data, &view) }
    }

    fn discover(&mut self, query: &str, scope: u8, token: RequestToken) -> bool {
        let Some(discover) = self.ops.discover else {
            return false;
        };
        let Ok(query) = CString::new(query) else {
            return false;
        };
        // SAFETY: discover was supplied by the host.
        unsafe { discover(self.ops.user_data, query.as_ptr(), scope, token.as_raw()) }
    }

    fn initiate_secure_handshake(
        &mut self,
        endpoint: &Endpoint,
        password: &str,
        identity_hint: &[u8],
        token: RequestToken,
    ) -> bool {
        let Some(handshake) = self.ops.initiate_secure_handshake else {
            return false;
        };
        let (Some(strings), Ok(password)) = (EndpointStrings::new(endpoint), CString::new(password))
        else {
            return false;
        };
        let view = strings.view(endpoint);
        // SAFETY: handshake was supplied by the host; buffers outlive the call.
        unsafe {
            handshake(
                self.ops.user_data,
                &view,
                password.as_ptr(),
                identity_hint.as_ptr(),
                identity_hint.len(),
                token.as_raw(),
            )
        }
    }

    fn set_max_payload_size(&mut self, size: usize) {
        if let Some(set) = self.ops.set_max_payload_size {
            // SAFETY: supplied by the host.
            unsafe { set(self.ops.user_data, size) }
        }
    }

    fn shutdown(&mut self) {
        if let Some(shutdown) = self.ops.shutdown {
            // SAFETY: supplied by the host.
            unsafe { shutdown(self.ops.user_data) }
        }
        self.sink = None;
    }
}

// =============================================================================
// Event feed
// =============================================================================

unsafe fn sink_ref<'a>(sink: *const KnxEventSink) -> Option<&'a EventSink> {
    sink.cast::<EventSink>().as_ref()
}

unsafe fn opt_str_arg(s: *const c_char) -> Option<Option<String>> {
    if s.is_null() {
        return Some(None);
    }
    CStr::from_ptr(s).to_str().ok().map(|s| Some(s.to_string()))
}

/// Report the response to a submitted request.
///
/// `status` is a bridge status code (0 = OK, see `KnxStatus`).
///
/// # Safety
/// - `sink` must be the handle passed to `init` and not yet shut down.
/// - `payload` must point to `payload_len` readable bytes (or be NULL if 0).
/// - `source` must be a valid null-terminated C string or NULL.
///
/// # Returns
/// `true` if the event was queued.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_engine_response(
    sink: *const KnxEventSink,
    token: u64,
    status: i32,
    content_format: u16,
    payload: *const u8,
    payload_len: usize,
    source: *const c_char,
) -> bool {
    let (Some(sink), Some(payload), Some(source)) = (
        sink_ref(sink),
        bytes_arg(payload, payload_len),
        opt_str_arg(source),
    ) else {
        return false;
    };
    sink.push(EngineEvent::Response {
        token: RequestToken::from_raw(token),
        status: Status::from_code(status),
        content_format: ContentFormat::from_number(content_format),
        payload: payload.to_vec(),
        source: source.map(Endpoint::new),
    })
}

/// Report one reply to a discovery query.
///
/// # Safety
/// - `sink` must be the handle passed to `init` and not yet shut down.
/// - `payload` must point to `payload_len` readable bytes.
/// - `source` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_engine_discovery_reply(
    sink: *const KnxEventSink,
    token: u64,
    payload: *const u8,
    payload_len: usize,
    source: *const c_char,
    transport_handle: u64,
) -> bool {
    let (Some(sink), Some(payload), Some(Some(source))) = (
        sink_ref(sink),
        bytes_arg(payload, payload_len),
        opt_str_arg(source),
    ) else {
        return false;
    };
    sink.push(EngineEvent::DiscoveryReply {
        token: RequestToken::from_raw(token),
        payload: payload.to_vec(),
        source: Endpoint::new(source).with_transport_handle(transport_handle),
    })
}

/// Report the outcome of a secure handshake. `status` 0 means success.
///
/// # Safety
/// - `sink` must be the handle passed to `init` and not yet shut down.
/// - `identity`/`secret` must point to the given number of bytes.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_engine_handshake_result(
    sink: *const KnxEventSink,
    token: u64,
    status: i32,
    identity: *const u8,
    identity_len: usize,
    secret: *const u8,
    secret_len: usize,
) -> bool {
    let (Some(sink), Some(identity), Some(secret)) = (
        sink_ref(sink),
        bytes_arg(identity, identity_len),
        bytes_arg(secret, secret_len),
    ) else {
        return false;
    };
    sink.push(EngineEvent::HandshakeResult {
        token: RequestToken::from_raw(token),
        status,
        security_identity: identity.to_vec(),
        secret: secret.to_vec(),
    })
}

/// Report a group message received while acting as gateway. `payload` is CBOR.
///
/// # Safety
/// - `sink` must be the handle passed to `init` and not yet shut down.
/// - `sender` must be a valid null-terminated C string.
/// - `payload` must point to `payload_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_engine_gateway_notification(
    sink: *const KnxEventSink,
    sender: *const c_char,
    payload: *const u8,
    payload_len: usize,
) -> bool {
    let (Some(sink), Some(Some(sender)), Some(payload)) = (
        sink_ref(sink),
        opt_str_arg(sender),
        bytes_arg(payload, payload_len),
    ) else {
        return false;
    };
    sink.push(EngineEvent::GatewayNotification {
        sender,
        payload: payload.to_vec(),
    })
}

/// Report a changed remote resource. `types` and `interfaces` are
/// space-separated lists and may be NULL.
///
/// # Safety
/// - `sink` must be the handle passed to `init` and not yet shut down.
/// - All strings must be valid null-terminated C strings or NULL.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_engine_resource_changed(
    sink: *const KnxEventSink,
    anchor: *const c_char,
    uri: *const c_char,
    types: *const c_char,
    interfaces: *const c_char,
) -> bool {
    let (Some(sink), Some(anchor), Some(uri), Some(types), Some(interfaces)) = (
        sink_ref(sink),
        opt_str_arg(anchor),
        opt_str_arg(uri),
        opt_str_arg(types),
        opt_str_arg(interfaces),
    ) else {
        return false;
    };
    let split = |s: Option<String>| -> Vec<String> {
        s.map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    };
    sink.push(EngineEvent::ResourceChanged {
        anchor: anchor.unwrap_or_default(),
        uri: uri.unwrap_or_default(),
        types: split(types),
        interfaces: split(interfaces),
    })
}
