// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Response payload handling.
//!
//! The engine hands over raw payload bytes together with their declared
//! content format. Callers only ever see text: structured (CBOR) payloads are
//! rendered as compact JSON, link-format listings are passed through, and
//! anything else becomes an `"error"` result with an empty body.

pub mod link_format;
pub mod smode;

pub use link_format::{LinkEntry, LinkFormat};
pub use smode::{encode_s_mode, ServiceType, SModeValue};

use ciborium::value::Value as CborValue;
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// Declared content format of a payload (CoAP content-format numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    /// `application/link-format` (40).
    LinkFormat,
    /// `application/json` (50).
    Json,
    /// `application/cbor` (60).
    Cbor,
    /// Anything else, including "no payload".
    Other(u16),
}

impl ContentFormat {
    /// Map a CoAP content-format number.
    pub fn from_number(n: u16) -> Self {
        match n {
            40 => ContentFormat::LinkFormat,
            50 => ContentFormat::Json,
            60 => ContentFormat::Cbor,
            other => ContentFormat::Other(other),
        }
    }

    /// CoAP content-format number.
    pub fn number(self) -> u16 {
        match self {
            ContentFormat::LinkFormat => 40,
            ContentFormat::Json => 50,
            ContentFormat::Cbor => 60,
            ContentFormat::Other(n) => n,
        }
    }
}

/// Textual format of a rendered payload, as named to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    LinkFormat,
    Error,
}

impl PayloadFormat {
    /// Name passed to the client-response handler.
    pub fn name(self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::LinkFormat => "link_format",
            PayloadFormat::Error => "error",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload converted for the external caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPayload {
    pub format: PayloadFormat,
    pub text: String,
}

impl RenderedPayload {
    /// `"error"` result with an empty body.
    pub fn error() -> Self {
        Self {
            format: PayloadFormat::Error,
            text: String::new(),
        }
    }

    /// Size in bytes of the rendered text.
    pub fn size(&self) -> usize {
        self.text.len()
    }
}

/// Convert a response payload to text according to its content format.
pub fn render(format: ContentFormat, bytes: &[u8]) -> RenderedPayload {
    match format {
        ContentFormat::LinkFormat => RenderedPayload {
            format: PayloadFormat::LinkFormat,
            text: String::from_utf8_lossy(bytes).into_owned(),
        },
        ContentFormat::Json => RenderedPayload {
            format: PayloadFormat::Json,
            text: String::from_utf8_lossy(bytes).into_owned(),
        },
        ContentFormat::Cbor => match cbor_to_json_text(bytes) {
            Some(text) => RenderedPayload {
                format: PayloadFormat::Json,
                text,
            },
            None => RenderedPayload::error(),
        },
        ContentFormat::Other(n) => {
            log::trace!("[payload] unsupported content format {}", n);
            RenderedPayload::error()
        }
    }
}

/// Decode a CBOR document and render it as compact JSON.
///
/// An empty input renders as an empty string. Returns `None` if the bytes are
/// not a single well-formed CBOR item.
pub fn cbor_to_json_text(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return Some(String::new());
    }
    let value: CborValue = match ciborium::de::from_reader(bytes) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[payload] malformed CBOR payload ({} bytes): {}", bytes.len(), e);
            return None;
        }
    };
    serde_json::to_string(&cbor_to_json(&value)).ok()
}

fn cbor_to_json(value: &CborValue) -> JsonValue {
    match value {
        CborValue::Null => JsonValue::Null,
        CborValue::Bool(b) => JsonValue::Bool(*b),
        CborValue::Integer(i) => integer_to_json(i128::from(*i)),
        CborValue::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        CborValue::Text(s) => JsonValue::String(s.clone()),
        CborValue::Bytes(b) => JsonValue::String(hex(b)),
        CborValue::Tag(_, inner) => cbor_to_json(inner),
        CborValue::Array(items) => JsonValue::Array(items.iter().map(cbor_to_json).collect()),
        CborValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(map_key(k), cbor_to_json(v));
            }
            JsonValue::Object(map)
        }
        _ => JsonValue::Null,
    }
}

fn integer_to_json(i: i128) -> JsonValue {
    if let Ok(n) = i64::try_from(i) {
        JsonValue::from(n)
    } else if let Ok(n) = u64::try_from(i) {
        JsonValue::from(n)
    } else {
        JsonValue::String(i.to_string())
    }
}

// KNX payloads key maps by small integers; JSON needs string keys.
fn map_key(key: &CborValue) -> String {
    match key {
        CborValue::Text(s) => s.clone(),
        CborValue::Integer(i) => i128::from(*i).to_string(),
        other => cbor_to_json(other).to_string(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
