// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Start/stop/signal lifecycle, cooperative polling and file configuration.

mod common;

use common::{wait_until, Responder, ScriptedEngine};
use knx_bridge::{
    Bridge, BridgeConfig, BridgeError, Event, EventCategory, LoopState, Threading,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_signal_before_start_and_after_stop() {
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge");

    bridge.signal();
    assert_eq!(bridge.state(), LoopState::Stopped);
    assert_eq!(engine.state.lock().polls, 0);

    bridge.start(None).expect("start");
    assert_eq!(bridge.state(), LoopState::Running);
    bridge.stop();

    let polls = engine.state.lock().polls;
    bridge.signal();
    bridge.signal();
    assert_eq!(engine.state.lock().polls, polls);
    assert_eq!(bridge.state(), LoopState::Stopped);
}

#[test]
fn test_double_stop_releases_engine_once() {
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge");
    bridge.start(None).expect("start");

    bridge.stop();
    bridge.stop();
    assert_eq!(engine.state.lock().shutdowns, 1);

    // Dropping after stop does not release again.
    drop(bridge);
    assert_eq!(engine.state.lock().shutdowns, 1);
}

#[test]
fn test_stop_during_slow_init_releases_engine_once() {
    for _ in 0..10 {
        let engine = ScriptedEngine::new(Responder::Silent);
        engine.state.lock().init_delay = Duration::from_millis(30);
        let bridge = Arc::new(Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge"));

        let starter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || bridge.start(None))
        };
        thread::sleep(Duration::from_millis(10));
        bridge.stop();
        let started = starter.join().expect("start thread");

        let state = engine.state.lock();
        assert!(state.shutdowns <= 1, "engine released {} times", state.shutdowns);
        assert_eq!(state.shutdowns, state.inits);
        drop(state);
        assert!(matches!(started, Ok(()) | Err(BridgeError::ShutDown)));
        assert_eq!(bridge.state(), LoopState::Stopped);
    }
}

#[test]
fn test_stop_without_start() {
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge");
    bridge.stop();
    assert_eq!(engine.state.lock().shutdowns, 0);
    assert!(matches!(bridge.start(None), Err(BridgeError::ShutDown)));
}

#[test]
fn test_start_twice_rejected() {
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Bridge::new(engine, BridgeConfig::default()).expect("bridge");
    bridge.start(None).expect("start");
    assert!(matches!(bridge.start(None), Err(BridgeError::AlreadyRunning)));
    bridge.stop();
}

#[test]
fn test_drop_joins_worker() {
    let engine = ScriptedEngine::new(Responder::Silent);
    {
        let bridge = Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge");
        bridge.start(None).expect("start");
        assert!(wait_until(|| engine.state.lock().polls >= 1));
    }
    assert_eq!(engine.state.lock().shutdowns, 1);
}

#[test]
fn test_stop_from_handler_on_worker() {
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Arc::new(Bridge::new(engine.clone(), BridgeConfig::default()).expect("bridge"));
    let weak = Arc::downgrade(&bridge);
    bridge.install(EventCategory::DiscoveryResult, move |_: &Event| {
        if let Some(b) = weak.upgrade() {
            b.stop();
        }
    });
    bridge.start(None).expect("start");

    let token = bridge.discover_default().expect("discover");
    engine.discovery_reply(token, "<>;ep=urn:knx:sn.A001", "fe80::1");

    assert!(wait_until(|| engine.state.lock().shutdowns == 1));
    assert!(wait_until(|| bridge.state() == LoopState::Stopped));
    assert_eq!(bridge.device_count(), 0);
}

#[test]
fn test_cooperative_mode_polls_on_caller() {
    let engine = ScriptedEngine::new(Responder::EchoPath);
    let config = BridgeConfig {
        threading: Threading::Cooperative,
        ..BridgeConfig::default()
    };
    let bridge = Bridge::new(engine.clone(), config).expect("bridge");
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    bridge.install(EventCategory::ClientResponse, move |_: &Event| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    bridge.start(None).expect("start");
    bridge.register_device("A001", "fe80::1").expect("register");

    bridge.get("A001", "/p/1", None, "t").expect("get");
    // Nothing happens until the host polls.
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(engine.state.lock().polls, 0);

    bridge.poll().expect("poll");
    assert_eq!(count.load(Ordering::SeqCst), 1);
    bridge.stop();
}

#[test]
fn test_bridge_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
max_payload_size = 1024
max_devices = 1
threading = "cooperative"

[identity]
name = "test-client"
serial_number = "000001"
"#
    )
    .expect("write config");

    let config = BridgeConfig::from_file(file.path()).expect("load config");
    let engine = ScriptedEngine::new(Responder::Silent);
    let bridge = Bridge::new(engine.clone(), config).expect("bridge");
    bridge.start(None).expect("start");

    assert_eq!(bridge.max_payload_size(), 1024);
    let identity = engine.state.lock().identity.clone().expect("identity");
    assert_eq!(identity.name, "test-client");
    assert_eq!(identity.manufacturer, "Cascoda");

    bridge.register_device("A001", "fe80::1").expect("first device");
    assert!(matches!(
        bridge.register_device("B002", "fe80::2"),
        Err(BridgeError::RegistryFull(1))
    ));
    bridge.stop();
}

#[test]
fn test_invalid_config_rejected() {
    let config = BridgeConfig {
        max_payload_size: 0,
        ..BridgeConfig::default()
    };
    let err = Bridge::new(ScriptedEngine::new(Responder::Silent), config).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));
}
