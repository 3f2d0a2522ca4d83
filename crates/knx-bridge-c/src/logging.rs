// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide logger ownership for the C API.
//!
//! `log` accepts a single logger per process. The bridge installs a
//! `RUST_LOG`-driven default the first time a bridge is created unless the
//! host installed one before. [`knx_bridge_logging_owner`] tells the host
//! which of the two won.

use parking_lot::Mutex;
use std::ffi::CStr;
use std::os::raw::c_char;

use super::KnxBridgeError;

/// Log level for bridge logging
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnxLogLevel {
    KnxLogOff = 0,
    KnxLogError = 1,
    KnxLogWarn = 2,
    KnxLogInfo = 3,
    KnxLogDebug = 4,
    KnxLogTrace = 5,
}

impl From<KnxLogLevel> for log::LevelFilter {
    fn from(level: KnxLogLevel) -> Self {
        match level {
            KnxLogLevel::KnxLogOff => log::LevelFilter::Off,
            KnxLogLevel::KnxLogError => log::LevelFilter::Error,
            KnxLogLevel::KnxLogWarn => log::LevelFilter::Warn,
            KnxLogLevel::KnxLogInfo => log::LevelFilter::Info,
            KnxLogLevel::KnxLogDebug => log::LevelFilter::Debug,
            KnxLogLevel::KnxLogTrace => log::LevelFilter::Trace,
        }
    }
}

/// Who installed the process logger
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnxLogOwner {
    /// No logger installed through this library yet
    KnxLogUnset = 0,
    /// Default logger installed by the first `knx_bridge_create`
    KnxLogBridgeDefault = 1,
    /// Logger installed by `knx_bridge_logging_init`
    KnxLogHost = 2,
    /// Another component installed a logger first
    KnxLogExternal = 3,
}

static OWNER: Mutex<KnxLogOwner> = Mutex::new(KnxLogOwner::KnxLogUnset);

/// Install `builder` unless a logger is already in place.
///
/// Fails with the current owner when this call did not install it.
fn claim(owner: KnxLogOwner, builder: &mut env_logger::Builder) -> Result<(), KnxLogOwner> {
    let mut current = OWNER.lock();
    if *current != KnxLogOwner::KnxLogUnset {
        return Err(*current);
    }
    match builder.format_timestamp_millis().try_init() {
        Ok(()) => {
            *current = owner;
            Ok(())
        }
        Err(_) => {
            *current = KnxLogOwner::KnxLogExternal;
            Err(KnxLogOwner::KnxLogExternal)
        }
    }
}

/// Install the `RUST_LOG` default unless a logger is already in place.
pub(crate) fn install_default() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if let Err(owner) = claim(KnxLogOwner::KnxLogBridgeDefault, &mut builder) {
        log::trace!("[logging] keeping logger installed by {:?}", owner);
    }
}

/// Report which component owns the process logger.
#[no_mangle]
pub extern "C" fn knx_bridge_logging_owner() -> KnxLogOwner {
    *OWNER.lock()
}

/// Install a stderr logger at `level`, refined by an optional `env_logger`
/// filter string (e.g. `"knx_bridge=debug,warn"`).
///
/// Call before the first `knx_bridge_create` to replace the default logger.
///
/// # Safety
/// - `filter` must be a valid null-terminated C string or NULL.
///
/// # Returns
/// `KnxOk` if this call installed the logger, `KnxLoggerInstalled` if one
/// was already installed (see `knx_bridge_logging_owner`),
/// `KnxInvalidArgument` for a non-UTF-8 filter.
///
/// # Example (C)
/// ```c
/// if (knx_bridge_logging_init(KNX_LOG_INFO, "knx_bridge=debug") != KNX_OK) {
///     /* knx_bridge_logging_owner() says who got there first */
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn knx_bridge_logging_init(
    level: KnxLogLevel,
    filter: *const c_char,
) -> KnxBridgeError {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());
    if !filter.is_null() {
        let Ok(filter) = CStr::from_ptr(filter).to_str() else {
            return KnxBridgeError::KnxInvalidArgument;
        };
        builder.parse_filters(filter);
    }

    match claim(KnxLogOwner::KnxLogHost, &mut builder) {
        Ok(()) => KnxBridgeError::KnxOk,
        Err(owner) => {
            log::debug!("knx_bridge_logging_init: logger already installed by {:?}", owner);
            KnxBridgeError::KnxLoggerInstalled
        }
    }
}
