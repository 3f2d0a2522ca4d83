// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Caller-side request description.

use crate::engine::Method;
use crate::payload::ContentFormat;

/// A request addressed to a registered device.
///
/// ```ignore
/// let token = bridge.submit(
///     Request::get("00fa10010701", "/dev/sn")
///         .tag("sn-query")
///         .secure(false),
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub identifier: String,
    pub path: String,
    pub query: Option<String>,
    pub payload: Vec<u8>,
    pub content_format: Option<ContentFormat>,
    pub accept: Option<ContentFormat>,
    pub tag: String,
    /// Per-request override of the endpoint's secure flag.
    pub secure: Option<bool>,
}

impl Request {
    fn new(method: Method, identifier: &str, path: &str) -> Self {
        Self {
            method,
            identifier: identifier.to_string(),
            path: path.to_string(),
            query: None,
            payload: Vec::new(),
            content_format: None,
            accept: None,
            tag: String::new(),
            secure: None,
        }
    }

    /// GET expecting a structured (CBOR) response.
    pub fn get(identifier: &str, path: &str) -> Self {
        Self::new(Method::Get, identifier, path).accept(ContentFormat::Cbor)
    }

    /// GET expecting a link-format listing.
    pub fn get_link_format(identifier: &str, path: &str) -> Self {
        Self::new(Method::Get, identifier, path).accept(ContentFormat::LinkFormat)
    }

    /// POST of a pre-encoded CBOR body.
    pub fn post(identifier: &str, path: &str, payload: Vec<u8>) -> Self {
        Self::new(Method::Post, identifier, path).body(payload, ContentFormat::Cbor)
    }

    /// PUT of a pre-encoded CBOR body.
    pub fn put(identifier: &str, path: &str, payload: Vec<u8>) -> Self {
        Self::new(Method::Put, identifier, path).body(payload, ContentFormat::Cbor)
    }

    pub fn delete(identifier: &str, path: &str) -> Self {
        Self::new(Method::Delete, identifier, path)
    }

    #[must_use]
    pub fn query(mut self, query: &str) -> Self {
        self.query = (!query.is_empty()).then(|| query.to_string());
        self
    }

    /// Caller tag echoed back in the client-response.
    #[must_use]
    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    #[must_use]
    pub fn accept(mut self, format: ContentFormat) -> Self {
        self.accept = Some(format);
        self
    }

    #[must_use]
    pub fn body(mut self, payload: Vec<u8>, format: ContentFormat) -> Self {
        self.payload = payload;
        self.content_format = Some(format);
        self
    }

    /// Force OSCORE on or off for this request only.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }
}
