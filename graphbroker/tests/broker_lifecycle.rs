// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lifecycle and failure-handling tests for ResourceBroker

mod common;

use common::{init_test_logging, Event, RecordingFactory};
use graphbroker::{
    BrokerError, BrokerOptions, BrokerState, ConfigOption, PoolConfig, ResourceBroker,
    ResourceConfig, SimpleRowMapper, RowMapper, Row,
};
use std::error::Error as _;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

fn resource() -> ResourceConfig {
    ResourceConfig::new("http://localhost:5820", "people").with_credentials("admin", "admin")
}

#[test]
fn test_acquire_before_initialize_is_not_ready() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();

    let unconfigured = ResourceBroker::new(factory);
    let start = Instant::now();
    let err = unconfigured.acquire().unwrap_err();
    assert!(matches!(err, BrokerError::NotReady { state: "uninitialized" }));
    assert!(start.elapsed() < Duration::from_secs(1));

    let (factory, _) = RecordingFactory::new();
    let configured = ResourceBroker::with_config(factory, resource());
    assert!(matches!(configured.acquire(), Err(BrokerError::NotReady { .. })));

    // No pool is ever created on demand
    assert!(recorder.events().is_empty());
}

#[test]
fn test_acquire_release_round_trip() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    let connection = broker.acquire().unwrap();
    assert_eq!(connection.pool, 1);
    assert_eq!(connection.generation(), 1);
    let id = connection.id;
    broker.release(connection).unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Created { pool: 1 },
            Event::ObtainEntered { pool: 1 },
            Event::Obtained { pool: 1, connection: id },
            Event::Released { pool: 1, connection: id },
        ]
    );
}

#[test]
fn test_release_without_live_pool_is_noop() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    let connection = broker.acquire().unwrap();
    broker.shutdown();

    recorder.faults.release.store(true, Ordering::SeqCst);
    broker.release(connection).unwrap();

    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, Event::Released { .. })));
}

#[test]
fn test_destroy_is_idempotent() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    broker.destroy();
    assert_eq!(broker.state(), BrokerState::Destroyed);
    broker.destroy();
    assert_eq!(broker.state(), BrokerState::Destroyed);

    assert!(broker.resource_config().is_none());
    assert!(broker.pool_config().is_none());

    let shutdowns = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::ShutDown { .. }))
        .count();
    assert_eq!(shutdowns, 1);
}

#[test]
fn test_shutdown_absorbs_backend_failure() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    recorder.faults.shutdown.store(true, Ordering::SeqCst);
    broker.shutdown();
    assert_eq!(broker.state(), BrokerState::Uninitialized);

    // Already shut down: nothing left to fail
    broker.shutdown();

    broker.initialize().unwrap();
    broker.destroy();
    assert_eq!(broker.state(), BrokerState::Destroyed);
}

#[test]
fn test_acquisition_failure_carries_cause() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    recorder.faults.obtain.store(true, Ordering::SeqCst);
    let err = broker.acquire().unwrap_err();
    assert!(matches!(err, BrokerError::Acquisition(_)));
    assert_eq!(err.source().unwrap().to_string(), "injected obtain failure");

    // Not retried
    let attempts = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::ObtainEntered { .. }))
        .count();
    assert_eq!(attempts, 1);
    assert!(broker.is_ready());
}

#[test]
fn test_release_failure_carries_cause() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    let connection = broker.acquire().unwrap();
    recorder.faults.release.store(true, Ordering::SeqCst);
    let err = broker.release(connection).unwrap_err();
    assert!(matches!(err, BrokerError::Release(_)));
    assert!(err.backend_cause().unwrap().to_string().contains("release"));
}

#[test]
fn test_pool_creation_failure_leaves_broker_uninitialized() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    recorder.faults.create.store(true, Ordering::SeqCst);
    let broker = ResourceBroker::with_config(factory, resource());

    assert!(matches!(broker.initialize(), Err(BrokerError::PoolCreation(_))));
    assert_eq!(broker.state(), BrokerState::Uninitialized);

    recorder.faults.create.store(false, Ordering::SeqCst);
    broker.initialize().unwrap();
    assert_eq!(broker.generation(), Some(1));
}

#[test]
fn test_derived_pool_config_is_deterministic() {
    init_test_logging();
    let mut derived = Vec::new();
    for _ in 0..2 {
        let (factory, recorder) = RecordingFactory::new();
        let broker = ResourceBroker::with_config(factory, resource());
        broker.initialize().unwrap();
        derived.extend(recorder.configs());
    }

    assert_eq!(derived.len(), 2);
    assert_eq!(derived[0], derived[1]);
    assert_eq!(derived[0], PoolConfig::using(&resource()));
}

#[test]
fn test_explicit_pool_config_is_used_verbatim() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let explicit = PoolConfig::using(&resource()).with_max_pool(3).with_min_idle(0);
    let broker = ResourceBroker::with_pool_config(factory, resource(), explicit.clone());
    broker.initialize().unwrap();

    assert_eq!(recorder.configs(), vec![explicit]);
}

#[test]
fn test_reconfigure_sequence() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    broker
        .reconfigure_option(ConfigOption::Named("strict".to_string()), true)
        .unwrap();

    let events = recorder.events();
    assert_eq!(
        events,
        vec![
            Event::Created { pool: 1 },
            Event::ObtainEntered { pool: 1 },
            Event::Obtained { pool: 1, connection: 1 },
            Event::Released { pool: 1, connection: 1 },
            Event::ShutDown { pool: 1 },
            Event::Created { pool: 2 },
        ]
    );

    let configs = recorder.configs();
    assert_eq!(configs[1], PoolConfig::using(&resource().with_flag("strict", true)));
    assert_eq!(broker.generation(), Some(2));
}

#[test]
fn test_reconfigure_without_probe() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource()).with_options(BrokerOptions {
        probe_before_reconfigure: false,
    });
    broker.initialize().unwrap();
    broker.set_reasoning(true).unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Created { pool: 1 },
            Event::ShutDown { pool: 1 },
            Event::Created { pool: 2 },
        ]
    );
    assert!(recorder.configs()[1].resource.reasoning);
}

#[test]
fn test_failed_probe_keeps_current_pool() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    recorder.faults.obtain.store(true, Ordering::SeqCst);
    assert!(matches!(broker.set_reasoning(true), Err(BrokerError::Acquisition(_))));

    assert_eq!(broker.generation(), Some(1));
    assert!(!broker.resource_config().unwrap().reasoning);
    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, Event::ShutDown { .. })));
}

#[test]
fn test_failed_rebuild_keeps_new_config() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    let broker = ResourceBroker::with_config(factory, resource());
    broker.initialize().unwrap();

    recorder.faults.create.store(true, Ordering::SeqCst);
    assert!(matches!(broker.set_reasoning(true), Err(BrokerError::PoolCreation(_))));
    assert_eq!(broker.state(), BrokerState::Uninitialized);
    assert!(broker.resource_config().unwrap().reasoning);

    recorder.faults.create.store(false, Ordering::SeqCst);
    broker.initialize().unwrap();
    assert!(recorder.configs().last().unwrap().resource.reasoning);
}

#[test]
fn test_drop_shuts_pool_down() {
    init_test_logging();
    let (factory, recorder) = RecordingFactory::new();
    {
        let broker = ResourceBroker::with_config(factory, resource());
        broker.initialize().unwrap();
    }
    assert_eq!(recorder.events().last(), Some(&Event::ShutDown { pool: 1 }));
}

#[test]
fn test_mapper_reused_across_rows() {
    let mapper = SimpleRowMapper;
    let first = mapper.map_row(&Row::new().with("x", "1").with("y", "2"));
    let second = mapper.map_row(&Row::new());

    assert_eq!(first.len(), 2);
    assert_eq!(first["x"], "1");
    assert_eq!(first["y"], "2");
    assert!(second.is_empty());
}
