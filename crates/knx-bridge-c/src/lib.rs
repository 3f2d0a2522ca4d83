// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # KNX Bridge C FFI Bindings
//!
//! C-compatible bindings for the KNX IoT bridge, used by the Python and C
//! clients. The host supplies its protocol engine as a [`KnxEngineOps`]
//! table and receives events through [`KnxBridgeCallbacks`].
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold the
//! invariants documented in each function's safety comment.

mod callbacks;
mod engine;
mod logging;

pub use callbacks::*;
pub use engine::*;
pub use logging::*;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::time::Instant;

use knx_bridge::{
    Bridge, BridgeConfig, BridgeError, LoopState, RequestToken, ServiceType, SModeValue,
    Status, Threading,
};

use engine::ForeignEngine;

/// Opaque handle to a bridge
#[repr(C)]
pub struct KnxBridge {
    _private: [u8; 0],
}

/// Error codes returned by the C API
///
/// # Error Code Categories
///
/// - 0-9: Generic errors
/// - 10-19: Lifecycle and configuration errors
/// - 20-29: Request errors
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnxBridgeError {
    /// Operation completed successfully
    KnxOk = 0,
    /// Invalid argument provided (null pointer, invalid UTF-8, bad value)
    KnxInvalidArgument = 1,
    /// No device with this identifier is registered
    KnxNotFound = 2,
    /// Generic operation failure
    KnxOperationFailed = 3,
    /// Device registry or pending-request table is full
    KnxResourceExhausted = 4,
    /// Output buffer too small
    KnxBufferTooSmall = 5,

    // === Lifecycle and configuration errors (10-19) ===
    /// Invalid or unreadable configuration
    KnxConfigError = 10,
    /// Event loop already running
    KnxAlreadyRunning = 11,
    /// Event loop not running
    KnxNotRunning = 12,
    /// Bridge has been stopped and cannot be restarted
    KnxShutDown = 13,
    /// Host engine failed to initialize
    KnxEngineInitFailed = 14,
    /// `knx_bridge_poll` called on a bridge driven by its worker thread
    KnxWorkerDriven = 15,
    /// A process logger is already installed
    KnxLoggerInstalled = 16,

    // === Request errors (20-29) ===
    /// Engine refused the request before sending
    KnxSubmissionRejected = 20,
    /// Request body exceeds the maximum payload size
    KnxPayloadTooLarge = 21,
    /// Payload could not be encoded
    KnxEncodingError = 22,
    /// Generic I/O error
    KnxIoError = 23,
}

impl From<&BridgeError> for KnxBridgeError {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::UnknownDevice(_) => KnxBridgeError::KnxNotFound,
            BridgeError::RegistryFull(_) | BridgeError::TooManyPending(_) => {
                KnxBridgeError::KnxResourceExhausted
            }
            BridgeError::Config(_) => KnxBridgeError::KnxConfigError,
            BridgeError::AlreadyRunning => KnxBridgeError::KnxAlreadyRunning,
            BridgeError::NotRunning => KnxBridgeError::KnxNotRunning,
            BridgeError::ShutDown => KnxBridgeError::KnxShutDown,
            BridgeError::EngineInit(_) => KnxBridgeError::KnxEngineInitFailed,
            BridgeError::WorkerDriven => KnxBridgeError::KnxWorkerDriven,
            BridgeError::SubmissionRejected(_) => KnxBridgeError::KnxSubmissionRejected,
            BridgeError::PayloadTooLarge { .. } => KnxBridgeError::KnxPayloadTooLarge,
            BridgeError::Encoding(_) => KnxBridgeError::KnxEncodingError,
            BridgeError::Io(_) => KnxBridgeError::KnxIoError,
        }
    }
}

fn report(result: knx_bridge::Result<()>, op: &str) -> KnxBridgeError {
    match result {
        Ok(()) => KnxBridgeError::KnxOk,
        Err(e) => {
            log::debug!("knx_bridge_{}: {}", op, e);
            KnxBridgeError::from(&e)
        }
    }
}

/// Threading model for bridge creation
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnxThreading {
    /// Use the configuration file or `KNX_BRIDGE_THREADING`
    KnxThreadingDefault = 0,
    /// Dedicated worker thread drives the engine
    KnxThreadingWorker = 1,
    /// Host drives the engine with `knx_bridge_poll`
    KnxThreadingCooperative = 2,
}

// =============================================================================
// Argument helpers
// =============================================================================

pub(crate) unsafe fn bridge_ref<'a>(bridge: *mut KnxBridge) -> Option<&'a Bridge> {
    bridge.cast::<Bridge>().as_ref()
}

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// NULL maps to `Some(None)`; invalid UTF-8 to `None`.
unsafe fn opt_str_arg<'a>(s: *const c_char) -> Option<Option<&'a str>> {
    if s.is_null() {
        Some(None)
    } else {
        str_arg(s).map(Some)
    }
}

pub(crate) unsafe fn bytes_arg<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(data, len))
    }
}

unsafe fn write_token(out: *mut u64, token: RequestToken) {
    if let Some(out) = out.as_mut() {
        *out = token.as_raw();
    }
}

/// Copy `text` plus a terminating NUL into a caller buffer.
unsafe fn copy_to_buffer(text: &str, buf: *mut c_char, buf_len: usize) -> KnxBridgeError {
    if buf.is_null() {
        return KnxBridgeError::KnxInvalidArgument;
    }
    let bytes = text.as_bytes();
    if bytes.len() + 1 > buf_len {
        return KnxBridgeError::KnxBufferTooSmall;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
    *buf.add(bytes.len()) = 0;
    KnxBridgeError::KnxOk
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Create a bridge over a host engine.
///
/// # Safety
/// - `ops` must point to a valid `KnxEngineOps` with `init`, `poll` and
///   `submit` set. The table is copied.
/// - `config_path` must be a valid null-terminated C string or NULL for
///   defaults.
/// - The returned handle must be released with `knx_bridge_destroy`.
///
/// # Returns
/// Opaque bridge handle, or NULL on failure
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_create(
    ops: *const KnxEngineOps,
    config_path: *const c_char,
) -> *mut KnxBridge {
    knx_bridge_create_with_threading(ops, config_path, KnxThreading::KnxThreadingDefault)
}

/// Create a bridge with an explicit threading model.
///
/// # Safety
/// Same as `knx_bridge_create`.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_create_with_threading(
    ops: *const KnxEngineOps,
    config_path: *const c_char,
    threading: KnxThreading,
) -> *mut KnxBridge {
    logging::install_default();

    let Some(ops) = ops.as_ref() else {
        return ptr::null_mut();
    };
    if !ops.is_complete() {
        log::error!("knx_bridge_create: engine ops missing init/poll/submit");
        return ptr::null_mut();
    }
    let Some(path) = opt_str_arg(config_path) else {
        return ptr::null_mut();
    };

    let config = match path {
        Some(p) => BridgeConfig::from_file(p),
        None => Ok(BridgeConfig::default()),
    };
    let mut config = match config {
        Ok(c) => c.apply_env(),
        Err(e) => {
            log::error!("knx_bridge_create: {}", e);
            return ptr::null_mut();
        }
    };
    match threading {
        KnxThreading::KnxThreadingDefault => {}
        KnxThreading::KnxThreadingWorker => config.threading = Threading::Worker,
        KnxThreading::KnxThreadingCooperative => config.threading = Threading::Cooperative,
    }

    match Bridge::new(ForeignEngine::new(*ops), config) {
        Ok(bridge) => Box::into_raw(Box::new(bridge)).cast::<KnxBridge>(),
        Err(e) => {
            log::error!("knx_bridge_create: {}", e);
            ptr::null_mut()
        }
    }
}

/// Stop and destroy a bridge.
///
/// # Safety
/// - `bridge` must be a valid pointer returned from `knx_bridge_create`,
///   or NULL.
/// - Must not be called from inside a bridge callback.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_destroy(bridge: *mut KnxBridge) {
    if !bridge.is_null() {
        let _ = Box::from_raw(bridge.cast::<Bridge>());
    }
}

/// Initialize the engine and start the event loop.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identity` must point to a valid `KnxIdentity` or be NULL. NULL fields
///   fall back to the configured identity.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_start(
    bridge: *mut KnxBridge,
    identity: *const KnxIdentity,
) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };

    let identity = match identity.as_ref() {
        None => None,
        Some(id) => {
            let mut resolved = bridge.config().identity.clone();
            let fields = [
                (id.manufacturer, &mut resolved.manufacturer),
                (id.name, &mut resolved.name),
                (id.version, &mut resolved.version),
                (id.serial_number, &mut resolved.serial_number),
            ];
            for (src, dst) in fields {
                match opt_str_arg(src) {
                    Some(Some(s)) => *dst = s.to_string(),
                    Some(None) => {}
                    None => return KnxBridgeError::KnxInvalidArgument,
                }
            }
            Some(resolved)
        }
    };
    report(bridge.start(identity), "start")
}

/// Run one cooperative poll cycle.
///
/// Returns `KnxWorkerDriven` if the bridge was created with a worker thread.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `next_ms` must be a valid pointer or NULL. It receives milliseconds
///   until the next engine timer, or -1 when none is armed.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_poll(bridge: *mut KnxBridge, next_ms: *mut i64) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    match bridge.poll() {
        Ok(deadline) => {
            if let Some(out) = next_ms.as_mut() {
                *out = deadline.map_or(-1, |d| {
                    let ms = d.saturating_duration_since(Instant::now()).as_millis();
                    i64::try_from(ms).unwrap_or(i64::MAX)
                });
            }
            KnxBridgeError::KnxOk
        }
        Err(e) => KnxBridgeError::from(&e),
    }
}

/// Wake the event loop. No effect unless running.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_signal(bridge: *mut KnxBridge) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    bridge.signal();
    KnxBridgeError::KnxOk
}

/// Stop the event loop and release the engine. Idempotent.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_stop(bridge: *mut KnxBridge) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    bridge.stop();
    KnxBridgeError::KnxOk
}

/// # Safety
/// - `bridge` must be a valid bridge handle or NULL.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_is_running(bridge: *mut KnxBridge) -> bool {
    bridge_ref(bridge).is_some_and(|b| b.state() == LoopState::Running)
}

// =============================================================================
// Requests
// =============================================================================

#[allow(clippy::too_many_arguments)]
unsafe fn request<F>(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    tag: *const c_char,
    token_out: *mut u64,
    op: &str,
    call: F,
) -> KnxBridgeError
where
    F: FnOnce(&Bridge, &str, &str, Option<&str>, &str) -> knx_bridge::Result<RequestToken>,
{
    let (Some(bridge), Some(identifier), Some(path), Some(query), Some(tag)) = (
        bridge_ref(bridge),
        str_arg(identifier),
        str_arg(path),
        opt_str_arg(query),
        opt_str_arg(tag),
    ) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    match call(bridge, identifier, path, query, tag.unwrap_or_default()) {
        Ok(token) => {
            write_token(token_out, token);
            KnxBridgeError::KnxOk
        }
        Err(e) => {
            log::debug!("knx_bridge_{}({}, {}): {}", op, identifier, path, e);
            KnxBridgeError::from(&e)
        }
    }
}

/// GET a resource; the response arrives as CBOR rendered to JSON.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identifier` and `path` must be valid null-terminated C strings.
/// - `query` and `tag` must be valid null-terminated C strings or NULL.
/// - `token_out` must be a valid pointer or NULL.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_get(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    tag: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    request(
        bridge,
        identifier,
        path,
        query,
        tag,
        token_out,
        "get",
        |b, sn, p, q, t| b.get(sn, p, q, t),
    )
}

/// GET a resource in link-format.
///
/// # Safety
/// Same as `knx_bridge_get`.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_get_link_format(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    tag: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    request(
        bridge,
        identifier,
        path,
        query,
        tag,
        token_out,
        "get_link_format",
        |b, sn, p, q, t| b.get_link_format(sn, p, q, t),
    )
}

/// POST a pre-encoded CBOR body.
///
/// # Safety
/// Same as `knx_bridge_get`; additionally `payload` must point to
/// `payload_len` readable bytes (or be NULL if 0).
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_post(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    payload: *const u8,
    payload_len: usize,
    tag: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    let Some(body) = bytes_arg(payload, payload_len) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    request(
        bridge,
        identifier,
        path,
        query,
        tag,
        token_out,
        "post",
        |b, sn, p, q, t| b.post(sn, p, q, body, t),
    )
}

/// PUT a pre-encoded CBOR body.
///
/// # Safety
/// Same as `knx_bridge_post`.
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_put(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    payload: *const u8,
    payload_len: usize,
    tag: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    let Some(body) = bytes_arg(payload, payload_len) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    request(
        bridge,
        identifier,
        path,
        query,
        tag,
        token_out,
        "put",
        |b, sn, p, q, t| b.put(sn, p, q, body, t),
    )
}

/// DELETE a resource.
///
/// # Safety
/// Same as `knx_bridge_get`.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_delete(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    path: *const c_char,
    query: *const c_char,
    tag: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    request(
        bridge,
        identifier,
        path,
        query,
        tag,
        token_out,
        "delete",
        |b, sn, p, q, t| b.delete(sn, p, q, t),
    )
}

/// Multicast a discovery query to scope `scope`.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `query` must be a valid null-terminated C string, or NULL for the
///   configured default query.
/// - `token_out` must be a valid pointer or NULL.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_discover(
    bridge: *mut KnxBridge,
    scope: u8,
    query: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    let (Some(bridge), Some(query)) = (bridge_ref(bridge), opt_str_arg(query)) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    let query = query.unwrap_or(bridge.config().discovery_query.as_str());
    match bridge.discover(scope, query) {
        Ok(token) => {
            write_token(token_out, token);
            KnxBridgeError::KnxOk
        }
        Err(e) => KnxBridgeError::from(&e),
    }
}

/// Start the password-based secure handshake with a registered device.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identifier` and `password` must be valid null-terminated C strings.
/// - `token_out` must be a valid pointer or NULL.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_initiate_secure_handshake(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    password: *const c_char,
    token_out: *mut u64,
) -> KnxBridgeError {
    let (Some(bridge), Some(identifier), Some(password)) =
        (bridge_ref(bridge), str_arg(identifier), str_arg(password))
    else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    match bridge.initiate_secure_handshake(identifier, password) {
        Ok(token) => {
            write_token(token_out, token);
            KnxBridgeError::KnxOk
        }
        Err(e) => KnxBridgeError::from(&e),
    }
}

/// Send an unconfirmed s-mode group message.
///
/// # Parameters
/// - `service`: `"w"`, `"r"` or `"rp"`
/// - `value_type`: 0 = boolean, 1 = integer, 2 = float
/// - `value`: textual value
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `service` and `value` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_issue_s_mode(
    bridge: *mut KnxBridge,
    scope: u8,
    sia: u32,
    group_address: u32,
    service: *const c_char,
    value_type: u8,
    value: *const c_char,
) -> KnxBridgeError {
    let (Some(bridge), Some(service), Some(value)) =
        (bridge_ref(bridge), str_arg(service), str_arg(value))
    else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    let (Some(service), Some(value)) = (
        ServiceType::from_code(service),
        SModeValue::parse(value_type, value),
    ) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    report(
        bridge.issue_s_mode(scope, sia, group_address, service, value),
        "issue_s_mode",
    )
}

// =============================================================================
// Devices
// =============================================================================

/// Register a device explicitly.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identifier` and `address` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_register_device(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    address: *const c_char,
) -> KnxBridgeError {
    let (Some(bridge), Some(identifier), Some(address)) =
        (bridge_ref(bridge), str_arg(identifier), str_arg(address))
    else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    report(
        bridge.register_device(identifier, address).map(|_| ()),
        "register_device",
    )
}

/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identifier` and `name` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_set_device_name(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    name: *const c_char,
) -> KnxBridgeError {
    let (Some(bridge), Some(identifier), Some(name)) =
        (bridge_ref(bridge), str_arg(identifier), str_arg(name))
    else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    report(bridge.set_device_name(identifier, name), "set_device_name")
}

/// Enable or disable OSCORE for requests to a device.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `identifier` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_set_device_secure(
    bridge: *mut KnxBridge,
    identifier: *const c_char,
    secure: bool,
) -> KnxBridgeError {
    let (Some(bridge), Some(identifier)) = (bridge_ref(bridge), str_arg(identifier)) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    report(bridge.set_device_secure(identifier, secure), "set_device_secure")
}

/// # Safety
/// - `bridge` must be a valid bridge handle or NULL (returns 0).
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_device_count(bridge: *mut KnxBridge) -> usize {
    bridge_ref(bridge).map_or(0, Bridge::device_count)
}

/// Copy the identifier of the device at `index` into `buf`.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
/// - `buf` must point to `buf_len` writable bytes.
///
/// # Returns
/// `KnxNotFound` past the end of the registry, `KnxBufferTooSmall` if the
/// identifier and its NUL do not fit.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_device_identifier(
    bridge: *mut KnxBridge,
    index: usize,
    buf: *mut c_char,
    buf_len: usize,
) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    match bridge.device_identifier(index) {
        Some(id) => copy_to_buffer(&id, buf, buf_len),
        None => KnxBridgeError::KnxNotFound,
    }
}

/// Remove every device from the registry.
///
/// # Safety
/// - `bridge` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_clear_devices(bridge: *mut KnxBridge) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    bridge.clear_devices();
    KnxBridgeError::KnxOk
}

// =============================================================================
// Limits and status
// =============================================================================

/// # Safety
/// - `bridge` must be a valid bridge handle.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_set_max_payload_size(
    bridge: *mut KnxBridge,
    size: usize,
) -> KnxBridgeError {
    let Some(bridge) = bridge_ref(bridge) else {
        return KnxBridgeError::KnxInvalidArgument;
    };
    report(bridge.set_max_payload_size(size), "set_max_payload_size")
}

/// # Safety
/// - `bridge` must be a valid bridge handle or NULL (returns 0).
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_get_max_payload_size(bridge: *mut KnxBridge) -> usize {
    bridge_ref(bridge).map_or(0, Bridge::max_payload_size)
}

/// Requests, discoveries and handshakes still awaiting an outcome.
///
/// # Safety
/// - `bridge` must be a valid bridge handle or NULL (returns 0).
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_pending_requests(bridge: *mut KnxBridge) -> usize {
    bridge_ref(bridge).map_or(0, Bridge::pending_requests)
}

/// Copy the symbolic name of a status code (e.g. `"STATUS_OK"`) into `buf`.
///
/// # Safety
/// - `buf` must point to `buf_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_status_name(
    status: i32,
    buf: *mut c_char,
    buf_len: usize,
) -> KnxBridgeError {
    copy_to_buffer(Status::from_code(status).name(), buf, buf_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            KnxBridgeError::from(&BridgeError::UnknownDevice("x".into())),
            KnxBridgeError::KnxNotFound
        );
        assert_eq!(
            KnxBridgeError::from(&BridgeError::TooManyPending(4)),
            KnxBridgeError::KnxResourceExhausted
        );
        assert_eq!(
            KnxBridgeError::from(&BridgeError::PayloadTooLarge { size: 2, max: 1 }),
            KnxBridgeError::KnxPayloadTooLarge
        );
        assert_eq!(
            KnxBridgeError::from(&BridgeError::WorkerDriven),
            KnxBridgeError::KnxWorkerDriven
        );
        assert_eq!(KnxBridgeError::KnxSubmissionRejected as i32, 20);
    }

    #[test]
    fn test_copy_to_buffer() {
        let mut buf = [0 as c_char; 8];
        unsafe {
            assert_eq!(
                copy_to_buffer("A001", buf.as_mut_ptr(), buf.len()),
                KnxBridgeError::KnxOk
            );
            assert_eq!(CStr::from_ptr(buf.as_ptr()).to_str().unwrap(), "A001");
            assert_eq!(
                copy_to_buffer("12345678", buf.as_mut_ptr(), buf.len()),
                KnxBridgeError::KnxBufferTooSmall
            );
        }
    }

    #[test]
    fn test_string_args() {
        let s = CString::new("abc").unwrap();
        unsafe {
            assert_eq!(str_arg(s.as_ptr()), Some("abc"));
            assert_eq!(str_arg(ptr::null()), None);
            assert_eq!(opt_str_arg(ptr::null()), Some(None));
            assert_eq!(bytes_arg(ptr::null(), 0), Some(&[][..]));
            assert_eq!(bytes_arg(ptr::null(), 3), None);
        }
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert_eq!(knx_bridge_create(ptr::null(), ptr::null()), ptr::null_mut());
            assert_eq!(
                knx_bridge_start(ptr::null_mut(), ptr::null()),
                KnxBridgeError::KnxInvalidArgument
            );
            assert_eq!(knx_bridge_device_count(ptr::null_mut()), 0);
            knx_bridge_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_status_name() {
        let mut buf = [0 as c_char; 32];
        unsafe {
            assert_eq!(
                knx_bridge_status_name(0, buf.as_mut_ptr(), buf.len()),
                KnxBridgeError::KnxOk
            );
            assert_eq!(
                CStr::from_ptr(buf.as_ptr()).to_str().unwrap(),
                Status::Ok.name()
            );
        }
    }
}
