// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by bridge operations.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by the bridge.
///
/// Only synchronous failures surface here. Anything that goes wrong after a
/// request has been accepted by the engine is reported through the
/// client-response callback with a non-success [`Status`](crate::Status).
#[derive(Debug, Error)]
pub enum BridgeError {
    // ========================================================================
    // Request errors
    // ========================================================================
    /// No device with this identifier is in the registry.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    /// The engine refused the request before sending it.
    #[error("Engine rejected {0} request")]
    SubmissionRejected(&'static str),
    /// Request body exceeds the configured maximum payload size.
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
    /// Structured payload could not be encoded.
    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    // ========================================================================
    // Resource errors
    // ========================================================================
    /// Device registry is at capacity.
    #[error("Device registry full ({0} entries)")]
    RegistryFull(usize),
    /// Too many requests are waiting for a response.
    #[error("Too many pending requests ({0})")]
    TooManyPending(usize),

    // ========================================================================
    // Lifecycle errors
    // ========================================================================
    /// `start()` called while the event loop is already running.
    #[error("Event loop already running")]
    AlreadyRunning,
    /// Operation requires a running event loop.
    #[error("Event loop not running")]
    NotRunning,
    /// The bridge has been stopped and cannot be restarted.
    #[error("Bridge has been shut down")]
    ShutDown,
    /// `poll()` called while the worker thread drives the engine.
    #[error("Engine is driven by the worker thread")]
    WorkerDriven,
    /// Engine initialisation failed.
    #[error("Engine initialisation failed: {0}")]
    EngineInit(String),
    /// Worker thread could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Configuration errors
    // ========================================================================
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
