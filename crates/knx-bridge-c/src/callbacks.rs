// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event callback FFI bindings
//!
//! C-compatible callbacks for the six bridge event categories. Strings
//! passed to a callback are null-terminated and valid only for the duration
//! of the call.
//!
//! # Usage from C
//!
//! ```c
//! void on_response(const char *sn, int32_t status, const char *format,
//!                  const char *tag, const char *path, size_t size,
//!                  const char *payload, void *user_data) {
//!     // copy what you need
//! }
//!
//! KnxBridgeCallbacks cbs = {0};
//! cbs.on_client_response = on_response;
//! cbs.user_data = my_context;
//! knx_bridge_set_callbacks(bridge, &cbs);
//! ```
//!
//! # Thread Safety
//!
//! Callbacks run on the event-loop worker (or on the thread calling
//! `knx_bridge_poll` in cooperative mode). They may call back into the bridge.

use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::Arc;

use knx_bridge::{Event, EventCategory, EventHandler};

use super::{bridge_ref, KnxBridge, KnxBridgeError};

// =============================================================================
// Callback types
// =============================================================================

/// A device changed state (`event` is e.g. `"discovered"`).
pub type KnxOnStateChanged = Option<
    unsafe extern "C" fn(
        identifier: *const c_char,
        address: *const c_char,
        event: *const c_char,
        user_data: *mut c_void,
    ),
>;

/// A remote resource changed. `types` and `interfaces` are space-separated.
pub type KnxOnResourceChanged = Option<
    unsafe extern "C" fn(
        anchor: *const c_char,
        uri: *const c_char,
        types: *const c_char,
        interfaces: *const c_char,
        user_data: *mut c_void,
    ),
>;

/// Terminal notification for a request.
///
/// # Parameters
/// - `status`: bridge status code (0 = OK)
/// - `format`: `"json"`, `"link_format"` or `"error"`
/// - `payload_size`/`payload`: rendered payload text
pub type KnxOnClientResponse = Option<
    unsafe extern "C" fn(
        identifier: *const c_char,
        status: i32,
        format: *const c_char,
        tag: *const c_char,
        path: *const c_char,
        payload_size: usize,
        payload: *const c_char,
        user_data: *mut c_void,
    ),
>;

/// Raw discovery reply text.
pub type KnxOnDiscoveryResult = Option<
    unsafe extern "C" fn(payload_size: usize, payload: *const c_char, user_data: *mut c_void),
>;

/// Outcome of a secure handshake. `status` is -1 when the engine refused it.
pub type KnxOnHandshakeResult = Option<
    unsafe extern "C" fn(
        identifier: *const c_char,
        status: i32,
        security_identity: *const u8,
        security_identity_size: usize,
        secret: *const u8,
        secret_size: usize,
        user_data: *mut c_void,
    ),
>;

/// Gateway group message rendered as JSON.
pub type KnxOnGatewayNotification = Option<
    unsafe extern "C" fn(
        sender: *const c_char,
        payload_size: usize,
        payload: *const c_char,
        user_data: *mut c_void,
    ),
>;

/// C-compatible callback set.
///
/// Any callback left NULL keeps the handler currently installed for that
/// category. The `user_data` pointer is passed through to every callback.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KnxBridgeCallbacks {
    pub on_state_changed: KnxOnStateChanged,
    pub on_resource_changed: KnxOnResourceChanged,
    pub on_client_response: KnxOnClientResponse,
    pub on_discovery_result: KnxOnDiscoveryResult,
    pub on_handshake_result: KnxOnHandshakeResult,
    pub on_gateway_notification: KnxOnGatewayNotification,
    /// User-provided context pointer, passed to all callbacks.
    pub user_data: *mut c_void,
}

// Safety: The C caller is responsible for thread safety of user_data and callbacks.
// Callbacks are invoked from the event-loop worker thread.
unsafe impl Send for KnxBridgeCallbacks {}
unsafe impl Sync for KnxBridgeCallbacks {}

// =============================================================================
// Bridging to EventHandler
// =============================================================================

/// Lossy conversion for callback strings; interior NULs are dropped.
fn c_text(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// Handler forwarding one event category to its C callback.
struct ForeignHandler {
    callbacks: KnxBridgeCallbacks,
}

impl EventHandler for ForeignHandler {
    fn on_event(&self, event: &Event) {
        let ud = self.callbacks.user_data;
        // SAFETY: each callback was supplied by the host; every pointer
        // passed outlives the call.
        unsafe {
            match event {
                Event::StateChanged {
                    identifier,
                    address,
                    event,
                } => {
                    if let Some(cb) = self.callbacks.on_state_changed {
                        let (i, a, e) = (c_text(identifier), c_text(address), c_text(event));
                        cb(i.as_ptr(), a.as_ptr(), e.as_ptr(), ud);
                    }
                }
                Event::ResourceChanged {
                    anchor,
                    uri,
                    types,
                    interfaces,
                } => {
                    if let Some(cb) = self.callbacks.on_resource_changed {
                        let (a, u) = (c_text(anchor), c_text(uri));
                        let t = c_text(&types.join(" "));
                        let i = c_text(&interfaces.join(" "));
                        cb(a.as_ptr(), u.as_ptr(), t.as_ptr(), i.as_ptr(), ud);
                    }
                }
                Event::ClientResponse {
                    identifier,
                    status,
                    format,
                    tag,
                    path,
                    payload,
                } => {
                    if let Some(cb) = self.callbacks.on_client_response {
                        let (i, f, t, p) = (c_text(identifier), c_text(format), c_text(tag), c_text(path));
                        let body = c_text(payload);
                        cb(
                            i.as_ptr(),
                            status.code(),
                            f.as_ptr(),
                            t.as_ptr(),
                            p.as_ptr(),
                            body.as_bytes().len(),
                            body.as_ptr(),
                            ud,
                        );
                    }
                }
                Event::DiscoveryResult { payload } => {
                    if let Some(cb) = self.callbacks.on_discovery_result {
                        let body = c_text(payload);
                        cb(body.as_bytes().len(), body.as_ptr(), ud);
                    }
                }
                Event::HandshakeResult {
                    identifier,
                    status,
                    security_identity,
                    secret,
                } => {
                    if let Some(cb) = self.callbacks.on_handshake_result {
                        let i = c_text(identifier);
                        cb(
                            i.as_ptr(),
                            *status,
                            byte_ptr(security_identity),
                            security_identity.len(),
                            byte_ptr(secret),
                            secret.len(),
                            ud,
                        );
                    }
                }
                Event::GatewayNotification {
                    sender,
                    payload_json,
                } => {
                    if let Some(cb) = self.callbacks.on_gateway_notification {
                        let (s, body) = (c_text(sender), c_text(payload_json));
                        cb(s.as_ptr(), body.as_bytes().len(), body.as_ptr(), ud);
                    }
                }
            }
        }
    }
}

fn byte_ptr(bytes: &[u8]) -> *const u8 {
    if bytes.is_empty() {
        ptr::null()
    } else {
        bytes.as_ptr()
    }
}

impl KnxBridgeCallbacks {
    fn installed(&self) -> Vec<EventCategory> {
        let slots = [
            (self.on_state_changed.is_some(), EventCategory::StateChanged),
            (self.on_resource_changed.is_some(), EventCategory::ResourceChanged),
            (self.on_client_response.is_some(), EventCategory::ClientResponse),
            (self.on_discovery_result.is_some(), EventCategory::DiscoveryResult),
            (self.on_handshake_result.is_some(), EventCategory::HandshakeResult),
            (
                self.on_gateway_notification.is_some(),
                EventCategory::GatewayNotification,
            ),
        ];
        slots
            .into_iter()
            .filter_map(|(set, category)| set.then_some(category))
            .collect()
    }
}

// =============================================================================
// FFI functions
// =============================================================================

/// Install callbacks on a bridge.
///
/// The struct is copied internally. The caller must ensure that any
/// `user_data` pointer and callback functions remain valid until they are
/// replaced or the bridge is destroyed.
///
/// # Safety
///
/// - `bridge` must be a valid pointer returned from `knx_bridge_create`.
/// - `callbacks` must be a valid pointer to a properly initialized `KnxBridgeCallbacks`.
///
/// # Returns
///
/// `KnxOk` on success, `KnxInvalidArgument` if either pointer is null or no
/// callback is set.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_set_callbacks(
    bridge: *mut KnxBridge,
    callbacks: *const KnxBridgeCallbacks,
) -> KnxBridgeError {
    let (Some(bridge), Some(callbacks)) = (bridge_ref(bridge), callbacks.as_ref()) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    let categories = callbacks.installed();
    if categories.is_empty() {
        return KnxBridgeError::KnxInvalidArgument;
    }

    let handler: Arc<dyn EventHandler> = Arc::new(ForeignHandler {
        callbacks: *callbacks,
    });
    for category in categories {
        bridge.install_shared(category, Arc::clone(&handler));
        log::debug!("knx-bridge-c: installed {} callback", category);
    }
    KnxBridgeError::KnxOk
}
