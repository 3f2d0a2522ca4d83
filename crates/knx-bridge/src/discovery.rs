// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery reply interpretation.
//!
//! A reply is a link-format listing. Each entry may carry an endpoint marker
//! `ep=urn:knx:sn.<serial>`; every marker with a non-empty serial registers
//! (or refreshes) a device at the sender's address and produces a
//! `"discovered"` state change. The raw reply is then delivered to the
//! discovery-result handler.

use crate::correlator::{Correlator, RequestToken};
use crate::dispatch::{CallbackTable, Event};
use crate::endpoint::Endpoint;
use crate::payload::LinkFormat;
use crate::registry::DeviceRegistry;

/// Prefix of the endpoint marker value that precedes the serial number.
pub const SERIAL_MARKER_PREFIX: &str = "urn:knx:sn.";

/// Link-format parameter carrying the endpoint marker.
pub const ENDPOINT_MARKER_PARAM: &str = "ep";

/// State-change event name for a discovered device.
pub const DISCOVERED_EVENT: &str = "discovered";

/// Extract the serial number from an endpoint marker value.
///
/// Returns `None` for values no longer than the prefix, values with another
/// prefix, and empty serials.
pub fn serial_from_marker(marker: &str) -> Option<&str> {
    if marker.len() <= SERIAL_MARKER_PREFIX.len() {
        return None;
    }
    marker
        .strip_prefix(SERIAL_MARKER_PREFIX)
        .map(str::trim)
        .filter(|serial| !serial.is_empty())
}

/// Serial numbers announced in a reply, in entry order.
pub fn serials_in_reply(reply: &str) -> Vec<String> {
    LinkFormat::parse(reply)
        .entries()
        .iter()
        .filter_map(|e| e.param(ENDPOINT_MARKER_PARAM))
        .filter_map(serial_from_marker)
        .map(str::to_string)
        .collect()
}

/// Everything a reply touches.
pub(crate) struct DiscoveryContext<'a> {
    pub registry: &'a DeviceRegistry,
    pub correlator: &'a Correlator,
    pub callbacks: &'a CallbackTable,
    pub secure_by_default: bool,
}

impl DiscoveryContext<'_> {
    /// Process one reply for the session identified by `token`.
    ///
    /// Returns the number of devices registered or refreshed. Replies for a
    /// closed or unknown session are dropped.
    pub fn handle_reply(&self, token: RequestToken, payload: &[u8], source: &Endpoint) -> usize {
        if !self.correlator.accept_discovery_reply(token) {
            log::debug!(
                "[discovery] reply from {} for closed session {}, dropped",
                source.address,
                token
            );
            return 0;
        }

        let text = String::from_utf8_lossy(payload);
        log::debug!("[discovery] reply from {} ({} bytes)", source.address, payload.len());

        let mut found = 0;
        for serial in serials_in_reply(&text) {
            let mut endpoint = source.clone().secured(self.secure_by_default);
            endpoint.serial_number = Some(serial.clone());

            match self
                .registry
                .upsert(&serial, Some(&source.address), Some(endpoint), None)
            {
                Ok(_) => {
                    found += 1;
                    self.callbacks.dispatch(&Event::StateChanged {
                        identifier: serial.clone(),
                        address: source.address.clone(),
                        event: DISCOVERED_EVENT.to_string(),
                    });
                }
                Err(e) => log::warn!("[discovery] {} not registered: {}", serial, e),
            }
        }

        self.callbacks.dispatch(&Event::DiscoveryResult {
            payload: text.into_owned(),
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::Pending;
    use crate::dispatch::EventCategory;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_serial_from_marker() {
        assert_eq!(serial_from_marker("urn:knx:sn.00fa10010701"), Some("00fa10010701"));
        assert_eq!(serial_from_marker("urn:knx:sn."), None);
        assert_eq!(serial_from_marker("urn:knx"), None);
        assert_eq!(serial_from_marker(""), None);
        assert_eq!(serial_from_marker("urn:xyz:sn.1234"), None);
        assert_eq!(serial_from_marker("urn:knx:sn.   "), None);
    }

    #[test]
    fn test_serials_in_reply() {
        let reply = "<>;ep=urn:knx:sn.A001,<>;ep=urn:knx:sn.B002\n</dev/sn>;rt=dpa.0.1";
        assert_eq!(serials_in_reply(reply), vec!["A001", "B002"]);
        assert!(serials_in_reply("<>;ep=urn:knx").is_empty());
    }

    struct Fixture {
        registry: DeviceRegistry,
        correlator: Correlator,
        callbacks: CallbackTable,
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let callbacks = CallbackTable::new();
            let events = Arc::new(Mutex::new(Vec::new()));
            for category in [EventCategory::StateChanged, EventCategory::DiscoveryResult] {
                let sink = Arc::clone(&events);
                callbacks.install(category, Arc::new(move |e: &Event| sink.lock().push(e.clone())));
            }
            Self {
                registry: DeviceRegistry::default(),
                correlator: Correlator::default(),
                callbacks,
                events,
            }
        }

        fn ctx(&self) -> DiscoveryContext<'_> {
            DiscoveryContext {
                registry: &self.registry,
                correlator: &self.correlator,
                callbacks: &self.callbacks,
                secure_by_default: true,
            }
        }
    }

    #[test]
    fn test_reply_registers_device_and_notifies_twice() {
        let fx = Fixture::new();
        let token = fx.correlator.begin(Pending::Discovery { continuous: false }).unwrap();
        let source = Endpoint::new("fe80::1").with_transport_handle(3);

        let n = fx
            .ctx()
            .handle_reply(token, b"<>;ep=urn:knx:sn.A001", &source);
        assert_eq!(n, 1);

        let device = fx.registry.find("A001").unwrap();
        assert_eq!(device.address.as_deref(), Some("fe80::1"));
        assert!(device.endpoint.is_secure());
        assert_eq!(device.endpoint.transport_handle, 3);
        assert_eq!(device.endpoint.serial_number.as_deref(), Some("A001"));

        let events = fx.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::StateChanged {
                identifier: "A001".into(),
                address: "fe80::1".into(),
                event: "discovered".into(),
            }
        );
        assert_eq!(
            events[1],
            Event::DiscoveryResult {
                payload: "<>;ep=urn:knx:sn.A001".into()
            }
        );
    }

    #[test]
    fn test_short_marker_is_ignored() {
        let fx = Fixture::new();
        let token = fx.correlator.begin(Pending::Discovery { continuous: false }).unwrap();
        let n = fx
            .ctx()
            .handle_reply(token, b"<>;ep=urn:knx", &Endpoint::new("fe80::1"));
        assert_eq!(n, 0);
        assert_eq!(fx.registry.count(), 0);
        // Raw reply is still delivered.
        assert_eq!(fx.events.lock().len(), 1);
    }

    #[test]
    fn test_single_shot_drops_later_replies() {
        let fx = Fixture::new();
        let token = fx.correlator.begin(Pending::Discovery { continuous: false }).unwrap();
        fx.ctx()
            .handle_reply(token, b"<>;ep=urn:knx:sn.A001", &Endpoint::new("fe80::1"));
        let n = fx
            .ctx()
            .handle_reply(token, b"<>;ep=urn:knx:sn.B002", &Endpoint::new("fe80::2"));
        assert_eq!(n, 0);
        assert_eq!(fx.registry.count(), 1);
    }

    #[test]
    fn test_continuous_session_keeps_processing() {
        let fx = Fixture::new();
        let token = fx.correlator.begin(Pending::Discovery { continuous: true }).unwrap();
        fx.ctx()
            .handle_reply(token, b"<>;ep=urn:knx:sn.A001", &Endpoint::new("fe80::1"));
        fx.ctx()
            .handle_reply(token, b"<>;ep=urn:knx:sn.B002", &Endpoint::new("fe80::2"));
        assert_eq!(fx.registry.identifiers(), vec!["A001", "B002"]);
    }

    #[test]
    fn test_rediscovery_updates_address() {
        let fx = Fixture::new();
        let t = fx.correlator.begin(Pending::Discovery { continuous: true }).unwrap();
        fx.ctx()
            .handle_reply(t, b"<>;ep=urn:knx:sn.A001", &Endpoint::new("fe80::1"));
        fx.ctx()
            .handle_reply(t, b"<>;ep=urn:knx:sn.A001", &Endpoint::new("fe80::2"));
        assert_eq!(fx.registry.count(), 1);
        assert_eq!(fx.registry.find("A001").unwrap().address.as_deref(), Some("fe80::2"));
    }
}
