// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport endpoint descriptor handed to and received from the engine.

use std::fmt;

/// CoAP default port.
pub const COAP_PORT: u16 = 5683;

/// Remote endpoint as understood by the protocol engine.
///
/// The bridge never interprets `address` or `transport_handle`; both are
/// produced by the engine (in reply events) and handed back to it verbatim
/// (in requests). The bridge only owns the security flag and the serial
/// number used by the secure handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    /// Printable address (e.g. `coap://[fe80::1]:5683`).
    pub address: String,
    /// Engine-specific connection cookie.
    pub transport_handle: u64,
    /// Serial number bound to this endpoint for the secure handshake.
    pub serial_number: Option<String>,
    /// Multicast scope, set only for group endpoints.
    pub multicast_scope: Option<u8>,
    secure: bool,
}

impl Endpoint {
    /// Create a unicast endpoint. Security starts disabled.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// All-KNX-nodes multicast group (`ff0<scope>::fd`, port 5683).
    pub fn all_knx_nodes(scope: u8) -> Self {
        Self {
            address: format!("coap://[ff0{:x}::fd]:{}", scope & 0x0f, COAP_PORT),
            multicast_scope: Some(scope),
            ..Self::default()
        }
    }

    /// Builder-style transport cookie.
    #[must_use]
    pub fn with_transport_handle(mut self, handle: u64) -> Self {
        self.transport_handle = handle;
        self
    }

    /// Enable or disable OSCORE protection for requests to this endpoint.
    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    /// Builder-style `set_secure`.
    #[must_use]
    pub fn secured(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Whether requests to this endpoint are OSCORE-protected.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Whether this is a group endpoint.
    pub fn is_multicast(&self) -> bool {
        self.multicast_scope.is_some()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        if self.secure {
            f.write_str(" (oscore)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_secure_is_explicit() {
        let mut ep = Endpoint::new("coap://[fe80::1]:5683");
        assert!(!ep.is_secure());
        ep.set_secure(true);
        ep.set_secure(true);
        assert!(ep.is_secure());
        ep.set_secure(false);
        assert!(!ep.is_secure());
    }

    #[test]
    fn test_multicast_group_address() {
        let ep = Endpoint::all_knx_nodes(2);
        assert_eq!(ep.address, "coap://[ff02::fd]:5683");
        assert!(ep.is_multicast());
        assert_eq!(Endpoint::all_knx_nodes(5).address, "coap://[ff05::fd]:5683");
    }

    #[test]
    fn test_display() {
        let ep = Endpoint::new("coap://[fe80::2]:5683").secured(true);
        assert_eq!(ep.to_string(), "coap://[fe80::2]:5683 (oscore)");
    }
}
