// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Group-object (s-mode) message encoding.
//!
//! Wire shape: `{ 4: sia, 5: { 6: st, 7: ga, 1: value } }`.

use ciborium::value::{Integer, Value};

use crate::error::{BridgeError, Result};

/// s-mode service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Write,
    Read,
    Response,
}

impl ServiceType {
    /// Short wire code.
    pub fn code(self) -> &'static str {
        match self {
            ServiceType::Write => "w",
            ServiceType::Read => "r",
            ServiceType::Response => "rp",
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "w" => Some(ServiceType::Write),
            "r" => Some(ServiceType::Read),
            "rp" => Some(ServiceType::Response),
            _ => None,
        }
    }
}

/// Value carried by an s-mode message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SModeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl SModeValue {
    /// Parse `text` as the given value type (0 = bool, 1 = int, 2 = float).
    ///
    /// Booleans accept only `"true"`; anything else is `false`. Numbers that
    /// fail to parse are treated as zero.
    pub fn parse(value_type: u8, text: &str) -> Option<Self> {
        let text = text.trim();
        match value_type {
            0 => Some(SModeValue::Bool(text == "true")),
            1 => Some(SModeValue::Int(text.parse().unwrap_or(0))),
            2 => Some(SModeValue::Float(text.parse().unwrap_or(0.0))),
            _ => None,
        }
    }

    fn to_cbor(self) -> Value {
        match self {
            SModeValue::Bool(b) => Value::Bool(b),
            SModeValue::Int(i) => Value::Integer(Integer::from(i)),
            SModeValue::Float(f) => Value::Float(f),
        }
    }
}

/// Encode an s-mode message body.
pub fn encode_s_mode(sia: u32, group_address: u32, service: ServiceType, value: SModeValue) -> Result<Vec<u8>> {
    let inner = Value::Map(vec![
        (int(6), Value::Text(service.code().to_string())),
        (int(7), Value::Integer(Integer::from(group_address))),
        (int(1), value.to_cbor()),
    ]);
    let root = Value::Map(vec![
        (int(4), Value::Integer(Integer::from(sia))),
        (int(5), inner),
    ]);

    let mut out = Vec::new();
    ciborium::ser::into_writer(&root, &mut out).map_err(|e| BridgeError::Encoding(e.to_string()))?;
    Ok(out)
}

fn int(i: u8) -> Value {
    Value::Integer(Integer::from(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::cbor_to_json_text;

    #[test]
    fn test_encode_write_bool() {
        let bytes = encode_s_mode(1, 1025, ServiceType::Write, SModeValue::Bool(true)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&cbor_to_json_text(&bytes).unwrap()).unwrap();
        assert_eq!(json["4"], 1);
        assert_eq!(json["5"]["6"], "w");
        assert_eq!(json["5"]["7"], 1025);
        assert_eq!(json["5"]["1"], true);
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(SModeValue::parse(0, "true"), Some(SModeValue::Bool(true)));
        assert_eq!(SModeValue::parse(0, "yes"), Some(SModeValue::Bool(false)));
        assert_eq!(SModeValue::parse(1, " 42 "), Some(SModeValue::Int(42)));
        assert_eq!(SModeValue::parse(1, "x"), Some(SModeValue::Int(0)));
        assert_eq!(SModeValue::parse(2, "2.5"), Some(SModeValue::Float(2.5)));
        assert_eq!(SModeValue::parse(7, "1"), None);
    }

    #[test]
    fn test_service_codes() {
        for st in [ServiceType::Write, ServiceType::Read, ServiceType::Response] {
            assert_eq!(ServiceType::from_code(st.code()), Some(st));
        }
        assert_eq!(ServiceType::from_code("x"), None);
    }
}
