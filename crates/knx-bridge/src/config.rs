// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Supports both programmatic and file-based configuration, with a small set
//! of environment overrides applied on top.
//!
//! # Configuration File
//!
//! ```toml
//! max_payload_size = 16384
//! max_devices = 50
//! discovery_query = "rt=urn:knx:dpa.*"
//! discovery_scope = 2
//! discovery_mode = "single_shot"
//! threading = "worker"
//!
//! [identity]
//! manufacturer = "Cascoda"
//! name = "py-client"
//! version = "1.0.0"
//! serial_number = "012349"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default maximum application payload size in bytes.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16384;

/// Default registry capacity.
pub const DEFAULT_MAX_DEVICES: usize = 50;

/// Default number of requests that may wait for a response at once.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 256;

/// Discovery query used when the caller does not supply one.
pub const DEFAULT_DISCOVERY_QUERY: &str = "rt=urn:knx:dpa.*";

/// Multicast scope used when the caller does not supply one (link-local).
pub const DEFAULT_DISCOVERY_SCOPE: u8 = 2;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the engine is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threading {
    /// A dedicated worker thread runs the poll cycle.
    #[default]
    Worker,
    /// The host calls `Bridge::poll()` itself.
    Cooperative,
}

/// Lifetime of a discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// The first reply completes the session; later replies are dropped.
    #[default]
    SingleShot,
    /// Every reply is processed until shutdown.
    Continuous,
}

/// Identity the local client presents to the engine on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
}

fn default_manufacturer() -> String {
    "Cascoda".to_string()
}

fn default_device_name() -> String {
    "py-client".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_serial_number() -> String {
    "012349".to_string()
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            name: default_device_name(),
            version: default_version(),
            serial_number: default_serial_number(),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Identity used by `start()` when none is supplied.
    #[serde(default)]
    pub identity: DeviceIdentity,

    /// Largest application payload accepted or requested, in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Registry capacity (0 = unbounded).
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,

    /// Pending request capacity (0 = unbounded).
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,

    /// Query used by `discover_default()`.
    #[serde(default = "default_discovery_query")]
    pub discovery_query: String,

    /// Multicast scope used by `discover_default()`.
    #[serde(default = "default_discovery_scope")]
    pub discovery_scope: u8,

    /// Discovery session lifetime.
    #[serde(default)]
    pub discovery_mode: DiscoveryMode,

    /// Worker thread or host-driven polling.
    #[serde(default)]
    pub threading: Threading,

    /// Initial secure flag of endpoints learnt through discovery.
    #[serde(default = "default_true")]
    pub secure_by_default: bool,

    /// Also report synchronous rejections through the client-response handler.
    #[serde(default)]
    pub synthesize_rejections: bool,
}

fn default_max_payload_size() -> usize {
    DEFAULT_MAX_PAYLOAD_SIZE
}

fn default_max_devices() -> usize {
    DEFAULT_MAX_DEVICES
}

fn default_max_pending_requests() -> usize {
    DEFAULT_MAX_PENDING_REQUESTS
}

fn default_discovery_query() -> String {
    DEFAULT_DISCOVERY_QUERY.to_string()
}

fn default_discovery_scope() -> u8 {
    DEFAULT_DISCOVERY_SCOPE
}

fn default_true() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_devices: DEFAULT_MAX_DEVICES,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            discovery_query: default_discovery_query(),
            discovery_scope: DEFAULT_DISCOVERY_SCOPE,
            discovery_mode: DiscoveryMode::SingleShot,
            threading: Threading::Worker,
            secure_by_default: true,
            synthesize_rejections: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KNX_BRIDGE_*` environment overrides.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Ok(s) = std::env::var("KNX_BRIDGE_MAX_PAYLOAD") {
            match s.parse::<usize>() {
                Ok(n) if n > 0 => self.max_payload_size = n,
                _ => log::warn!("[config] ignoring KNX_BRIDGE_MAX_PAYLOAD={}", s),
            }
        }
        if let Ok(s) = std::env::var("KNX_BRIDGE_DISCOVERY_SCOPE") {
            match s.parse::<u8>() {
                Ok(n) => self.discovery_scope = n,
                Err(_) => log::warn!("[config] ignoring KNX_BRIDGE_DISCOVERY_SCOPE={}", s),
            }
        }
        if let Ok(s) = std::env::var("KNX_BRIDGE_THREADING") {
            match s.to_ascii_lowercase().as_str() {
                "worker" => self.threading = Threading::Worker,
                "cooperative" => self.threading = Threading::Cooperative,
                _ => log::warn!("[config] ignoring KNX_BRIDGE_THREADING={}", s),
            }
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_size == 0 {
            return Err(ConfigError::Invalid("max_payload_size must be > 0".into()));
        }
        if self.discovery_query.is_empty() {
            return Err(ConfigError::Invalid("discovery_query is empty".into()));
        }
        if self.identity.serial_number.is_empty() {
            return Err(ConfigError::Invalid(
                "identity.serial_number is empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_payload_size, 16384);
        assert_eq!(config.discovery_query, "rt=urn:knx:dpa.*");
        assert_eq!(config.discovery_scope, 2);
        assert_eq!(config.threading, Threading::Worker);
        assert_eq!(config.identity.name, "py-client");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BridgeConfig::from_toml(
            r#"
            max_devices = 8
            discovery_mode = "continuous"
            threading = "cooperative"

            [identity]
            serial_number = "00fa10010701"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_devices, 8);
        assert_eq!(config.discovery_mode, DiscoveryMode::Continuous);
        assert_eq!(config.threading, Threading::Cooperative);
        assert_eq!(config.identity.serial_number, "00fa10010701");
        assert_eq!(config.identity.manufacturer, "Cascoda");
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_zero_payload_rejected() {
        let err = BridgeConfig::from_toml("max_payload_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_toml() {
        let err = BridgeConfig::from_toml("max_devices = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "discovery_scope = 5").unwrap();
        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.discovery_scope, 5);
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::from_file("/nonexistent/knx-bridge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
