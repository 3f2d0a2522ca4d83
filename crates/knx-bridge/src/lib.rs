// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! KNX IoT Bridge
//!
//! Asynchronous bridge between a single-threaded CoAP/OSCORE protocol engine
//! and callers running on any number of threads.
//!
//! # Features
//!
//! - **Serialized engine access**: one engine lock guards every engine call
//! - **Event loop**: worker thread sleeping until the next engine timer or a
//!   signal, or cooperative polling by the host
//! - **Request correlation**: exactly one client-response per accepted request
//! - **Discovery**: multicast queries populate a device registry
//! - **Payload rendering**: CBOR responses delivered as JSON text
//!
//! # Architecture
//!
//! ```text
//! caller thread ──submit──▶ Correlator::begin ──▶ [engine lock] engine.submit
//!                                                         │
//!                                  EventLoop::signal ◀────┘
//!
//! worker ──▶ [engine lock] engine.poll ──▶ EventSink queue ──▶ handlers
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use knx_bridge::{Bridge, BridgeConfig, Event, EventCategory};
//!
//! let bridge = Bridge::new(engine, BridgeConfig::default())?;
//! bridge.install(EventCategory::StateChanged, |e: &Event| {
//!     if let Event::StateChanged { identifier, address, .. } = e {
//!         println!("found {} at {}", identifier, address);
//!     }
//! });
//! bridge.start(None)?;
//! bridge.discover_default()?;
//! ```

pub mod bridge;
pub mod config;
pub mod correlator;
pub mod discovery;
pub mod dispatch;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod event_loop;
pub mod payload;
pub mod registry;
pub mod request;
pub mod status;

pub use bridge::{Bridge, S_MODE_PATH};
pub use config::{BridgeConfig, ConfigError, DeviceIdentity, DiscoveryMode, Threading};
pub use correlator::{Correlator, Pending, RequestContext, RequestToken};
pub use dispatch::{CallbackTable, Event, EventCategory, EventHandler};
pub use endpoint::Endpoint;
pub use engine::{EngineEvent, EngineRequest, EventSink, Method, ProtocolEngine};
pub use error::{BridgeError, Result};
pub use event_loop::{EventLoop, LoopState, PollCycle, WakeReason, WakeSignal};
pub use payload::{ContentFormat, PayloadFormat, RenderedPayload, ServiceType, SModeValue};
pub use registry::{DeviceHandle, DeviceRegistry};
pub use request::Request;
pub use status::Status;
