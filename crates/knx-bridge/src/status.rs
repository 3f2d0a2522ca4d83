// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Response status codes reported by the engine.
//!
//! Numeric codes follow the engine's own status enumeration (0 = OK, ...,
//! 22 = ping timeout). Negative codes are produced by the bridge itself for
//! requests that never reached the engine.

use std::fmt;

/// Status of a completed (or rejected) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Created,
    Changed,
    Deleted,
    NotModified,
    BadRequest,
    Unauthorized,
    BadOption,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    RequestEntityTooLarge,
    UnsupportedMediaType,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    ProxyingNotSupported,
    /// Engine-internal: response should be ignored.
    Ignore,
    /// Engine gave up waiting for the peer.
    PingTimeout,
    /// Bridge-synthesized: the request named a device that is not registered.
    UnknownDevice,
    /// Bridge-synthesized: the engine refused the request.
    SubmissionFailed,
    /// Any code the bridge does not recognise.
    Other(i32),
}

impl Status {
    /// Map an engine status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Status::Ok,
            1 => Status::Created,
            2 => Status::Changed,
            3 => Status::Deleted,
            4 => Status::NotModified,
            5 => Status::BadRequest,
            6 => Status::Unauthorized,
            7 => Status::BadOption,
            8 => Status::Forbidden,
            9 => Status::NotFound,
            10 => Status::MethodNotAllowed,
            11 => Status::NotAcceptable,
            12 => Status::RequestEntityTooLarge,
            13 => Status::UnsupportedMediaType,
            14 => Status::InternalServerError,
            15 => Status::NotImplemented,
            16 => Status::BadGateway,
            17 => Status::ServiceUnavailable,
            18 => Status::GatewayTimeout,
            19 => Status::ProxyingNotSupported,
            21 => Status::Ignore,
            22 => Status::PingTimeout,
            -1 => Status::SubmissionFailed,
            -2 => Status::UnknownDevice,
            other => Status::Other(other),
        }
    }

    /// Map a CoAP response code given as class and detail (e.g. 2, 5 for 2.05).
    pub fn from_coap(class: u8, detail: u8) -> Self {
        match (class, detail) {
            (2, 5) => Status::Ok,
            (2, 1) => Status::Created,
            (2, 4) => Status::Changed,
            (2, 2) => Status::Deleted,
            (2, 3) => Status::NotModified,
            (4, 0) => Status::BadRequest,
            (4, 1) => Status::Unauthorized,
            (4, 2) => Status::BadOption,
            (4, 3) => Status::Forbidden,
            (4, 4) => Status::NotFound,
            (4, 5) => Status::MethodNotAllowed,
            (4, 6) => Status::NotAcceptable,
            (4, 13) => Status::RequestEntityTooLarge,
            (4, 15) => Status::UnsupportedMediaType,
            (5, 0) => Status::InternalServerError,
            (5, 1) => Status::NotImplemented,
            (5, 2) => Status::BadGateway,
            (5, 3) => Status::ServiceUnavailable,
            (5, 4) => Status::GatewayTimeout,
            (5, 5) => Status::ProxyingNotSupported,
            _ => Status::Other(i32::from(class) * 100 + i32::from(detail)),
        }
    }

    /// Numeric code as exposed to foreign callers.
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Created => 1,
            Status::Changed => 2,
            Status::Deleted => 3,
            Status::NotModified => 4,
            Status::BadRequest => 5,
            Status::Unauthorized => 6,
            Status::BadOption => 7,
            Status::Forbidden => 8,
            Status::NotFound => 9,
            Status::MethodNotAllowed => 10,
            Status::NotAcceptable => 11,
            Status::RequestEntityTooLarge => 12,
            Status::UnsupportedMediaType => 13,
            Status::InternalServerError => 14,
            Status::NotImplemented => 15,
            Status::BadGateway => 16,
            Status::ServiceUnavailable => 17,
            Status::GatewayTimeout => 18,
            Status::ProxyingNotSupported => 19,
            Status::Ignore => 21,
            Status::PingTimeout => 22,
            Status::SubmissionFailed => -1,
            Status::UnknownDevice => -2,
            Status::Other(code) => code,
        }
    }

    /// Stable upper-case name (`"STATUS_OK"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "STATUS_OK",
            Status::Created => "STATUS_CREATED",
            Status::Changed => "STATUS_CHANGED",
            Status::Deleted => "STATUS_DELETED",
            Status::NotModified => "STATUS_NOT_MODIFIED",
            Status::BadRequest => "STATUS_BAD_REQUEST",
            Status::Unauthorized => "STATUS_UNAUTHORIZED",
            Status::BadOption => "STATUS_BAD_OPTION",
            Status::Forbidden => "STATUS_FORBIDDEN",
            Status::NotFound => "STATUS_NOT_FOUND",
            Status::MethodNotAllowed => "STATUS_METHOD_NOT_ALLOWED",
            Status::NotAcceptable => "STATUS_NOT_ACCEPTABLE",
            Status::RequestEntityTooLarge => "STATUS_REQUEST_ENTITY_TOO_LARGE",
            Status::UnsupportedMediaType => "STATUS_UNSUPPORTED_MEDIA_TYPE",
            Status::InternalServerError => "STATUS_INTERNAL_SERVER_ERROR",
            Status::NotImplemented => "STATUS_NOT_IMPLEMENTED",
            Status::BadGateway => "STATUS_BAD_GATEWAY",
            Status::ServiceUnavailable => "STATUS_SERVICE_UNAVAILABLE",
            Status::GatewayTimeout => "STATUS_GATEWAY_TIMEOUT",
            Status::ProxyingNotSupported => "STATUS_PROXYING_NOT_SUPPORTED",
            Status::Ignore => "IGNORE",
            Status::PingTimeout => "PING_TIMEOUT",
            Status::UnknownDevice => "UNKNOWN_DEVICE",
            Status::SubmissionFailed => "SUBMISSION_FAILED",
            Status::Other(_) => "UNKNOWN_STATUS",
        }
    }

    /// CoAP `class.detail` rendering, if the status maps onto a CoAP code.
    pub fn coap_code(self) -> Option<(u8, u8)> {
        let code = match self {
            Status::Ok => (2, 5),
            Status::Created => (2, 1),
            Status::Changed => (2, 4),
            Status::Deleted => (2, 2),
            Status::NotModified => (2, 3),
            Status::BadRequest => (4, 0),
            Status::Unauthorized => (4, 1),
            Status::BadOption => (4, 2),
            Status::Forbidden => (4, 3),
            Status::NotFound => (4, 4),
            Status::MethodNotAllowed => (4, 5),
            Status::NotAcceptable => (4, 6),
            Status::RequestEntityTooLarge => (4, 13),
            Status::UnsupportedMediaType => (4, 15),
            Status::InternalServerError => (5, 0),
            Status::NotImplemented => (5, 1),
            Status::BadGateway => (5, 2),
            Status::ServiceUnavailable => (5, 3),
            Status::GatewayTimeout => (5, 4),
            Status::ProxyingNotSupported => (5, 5),
            _ => return None,
        };
        Some(code)
    }

    /// True for 2.xx responses.
    pub fn is_success(self) -> bool {
        matches!(self.coap_code(), Some((2, _)))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coap_code() {
            Some((class, detail)) => write!(f, "{} ({}.{:02})", self.name(), class, detail),
            None => write!(f, "{} ({})", self.name(), self.code()),
        }
    }
}
