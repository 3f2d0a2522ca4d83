// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovered-device registry.
//!
//! Insertion-ordered collection of [`DeviceHandle`] keyed by identifier.
//! Index-based access is a view over the current order and is invalidated by
//! [`DeviceRegistry::clear`]; callers must not keep indices across concurrent
//! mutation.
//!
//! # Thread Safety
//!
//! All operations take a private `parking_lot::Mutex` for the duration of the
//! call only. Lookups return clones so no lock outlives the call.

use parking_lot::Mutex;

use crate::endpoint::Endpoint;
use crate::error::{BridgeError, Result};

/// Maximum stored length of a device display name, in characters.
pub const MAX_DEVICE_NAME_LEN: usize = 63;

/// A discovered or explicitly registered remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    identifier: String,
    /// Last address the device was observed at.
    pub address: Option<String>,
    /// Display name (may be empty).
    pub name: String,
    /// Connection descriptor, replaced wholesale on update.
    pub endpoint: Endpoint,
}

impl DeviceHandle {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            address: None,
            name: String::new(),
            endpoint: Endpoint::default(),
        }
    }

    /// Stable identifier (serial number) of the device.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Thread-safe device registry.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: Mutex<Vec<DeviceHandle>>,
    capacity: usize,
}

impl DeviceRegistry {
    /// Create a registry holding at most `capacity` devices (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Insert `identifier` if absent, then overwrite only the supplied fields.
    ///
    /// An `address` without an `endpoint` rebuilds the endpoint for the new
    /// address. The security flag and serial number carry over; the engine's
    /// transport handle does not.
    ///
    /// # Errors
    ///
    /// [`BridgeError::RegistryFull`] if the identifier is new and the registry
    /// is at capacity. Existing entries can always be updated.
    pub fn upsert(
        &self,
        identifier: &str,
        address: Option<&str>,
        endpoint: Option<Endpoint>,
        name: Option<&str>,
    ) -> Result<DeviceHandle> {
        let mut devices = self.devices.lock();

        let idx = match devices.iter().position(|d| d.identifier == identifier) {
            Some(idx) => idx,
            None => {
                if self.capacity != 0 && devices.len() >= self.capacity {
                    log::warn!(
                        "[registry] full ({} entries), dropping {}",
                        self.capacity,
                        identifier
                    );
                    return Err(BridgeError::RegistryFull(self.capacity));
                }
                devices.push(DeviceHandle::new(identifier));
                log::debug!("[registry] added {}", identifier);
                devices.len() - 1
            }
        };

        let device = &mut devices[idx];
        if let Some(address) = address {
            device.address = Some(address.to_string());
        }
        match (endpoint, address) {
            (Some(endpoint), _) => device.endpoint = endpoint,
            (None, Some(address)) if device.endpoint.address != address => {
                let serial_number = device.endpoint.serial_number.take();
                device.endpoint = Endpoint::new(address).secured(device.endpoint.is_secure());
                device.endpoint.serial_number = serial_number;
            }
            (None, _) => {}
        }
        if let Some(name) = name {
            device.name = name.chars().take(MAX_DEVICE_NAME_LEN).collect();
        }
        Ok(device.clone())
    }

    /// Look up a device by identifier.
    pub fn find(&self, identifier: &str) -> Option<DeviceHandle> {
        self.devices
            .lock()
            .iter()
            .find(|d| d.identifier == identifier)
            .cloned()
    }

    /// Device at position `index` in the current enumeration order.
    pub fn get_by_index(&self, index: usize) -> Option<DeviceHandle> {
        self.devices.lock().get(index).cloned()
    }

    /// Number of registered devices.
    pub fn count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    /// Identifiers in enumeration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.devices
            .lock()
            .iter()
            .map(|d| d.identifier.clone())
            .collect()
    }

    /// Set the security flag on a device's endpoint.
    ///
    /// Returns the updated handle, or `None` if the device is unknown.
    pub fn set_secure(&self, identifier: &str, secure: bool) -> Option<DeviceHandle> {
        self.modify(identifier, |d| d.endpoint.set_secure(secure))
    }

    /// Apply `f` to a device in place. Returns the updated handle.
    pub(crate) fn modify<F>(&self, identifier: &str, f: F) -> Option<DeviceHandle>
    where
        F: FnOnce(&mut DeviceHandle),
    {
        let mut devices = self.devices.lock();
        let device = devices.iter_mut().find(|d| d.identifier == identifier)?;
        f(device);
        Some(device.clone())
    }

    /// Remove all devices, releasing their endpoints.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.devices.lock());
        if !removed.is_empty() {
            log::debug!("[registry] cleared {} devices", removed.len());
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}
